//! Loads the shipped scenario files and runs them.

use pinworks_core::material::Material;
use pinworks_core::test_utils::*;
use pinworks_data::load_scenario;
use std::path::PathBuf;

fn data_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

#[test]
fn wire_line_file_matches_fixture() {
    let mut built = load_scenario(&data_file("wire_line.ron")).unwrap();
    let mut fixture = wire_line();

    assert_eq!(built.engine.stockpile_count(), 4);
    assert_eq!(built.engine.machine_count(), 2);
    assert_eq!(built.workers.len(), 2);

    for _ in 0..60 {
        built.engine.step().unwrap();
        fixture.engine.step().unwrap();
        assert_eq!(built.engine.state_hash(), fixture.engine.state_hash());
    }

    let puller_in = built.stockpile("puller_in").unwrap();
    assert_eq!(
        built
            .engine
            .stockpile(puller_in)
            .unwrap()
            .quantity(Material::SpindledWireCoil),
        1
    );
}

#[test]
fn pin_line_file_makes_pins() {
    let mut built = load_scenario(&data_file("pin_line.toml")).unwrap();
    let pins = built.stockpile("pins").unwrap();

    let ran = run_until(&mut built.engine, 400, |e| {
        e.stockpile(pins)
            .unwrap()
            .quantity(Material::BowlOfHeadlessPins)
            == 1
    });
    assert!(ran.is_some(), "the line never finished a bowl of pins");
    assert_invariants(&built.engine);
}
