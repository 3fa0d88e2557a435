//! Inputs file layout across variants: section order, key presence and
//! inline record blocks.

use fire_model_core::encoder::keys_for;
use fire_model_core::records::RecordTable;
use fire_model_core::{
    encode_input, section_headers, write_input_file, ModelVariant, OutputRequest, ParameterSet,
    RecordOrder, SpottingSeed, UnitSystem,
};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn keyed_lines(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|l| l.contains(": ") || l.ends_with(':'))
        .collect()
}

fn headers(text: &str) -> Vec<&str> {
    text.lines()
        .skip(1)
        .filter(|l| l.starts_with('#'))
        .collect()
}

/// Parameter set with every scalar switch and block set
fn full_parameters(variant: ModelVariant) -> ParameterSet {
    let weather = RecordTable::from_text("2018 3 23 700 78 20 0 5 180 10\n2018 3 23 600 80 18 0 4 170 10\n")
        .unwrap()
        .format(RecordOrder::Chronological);
    let mut params = ParameterSet::recommended(variant);
    params.conditioning_period_end = Some("08 01 1600".to_string());
    params.fuel_moistures = Some(
        RecordTable::from_text("1 4 3 6 10 16\n")
            .unwrap()
            .with_default_fuel_model()
            .format(RecordOrder::AsGiven),
    );
    params.raws_units = Some(UnitSystem::Metric);
    params.raws_elevation = Some(1200.0);
    params.raws = Some(weather.clone());
    params.weather_data = Some(weather.clone());
    params.wind_data = Some(weather);
    params.spread_direction_from_max = Some(0.0);
    params.gridded_winds_generate = Some(true);
    params.gridded_winds_resolution = Some(90.0);
    params.mtt.spotting_seed = SpottingSeed::new(4242);
    params.tom.iterations = Some(3);
    params.farsite.start_time = Some("08 07 1000".to_string());
    params.farsite.spotting_seed = SpottingSeed::new(7);
    params.farsite.burn_periods = Some(
        RecordTable::from_text("08 08 1000 1800\n08 07 1000 1800\n")
            .unwrap()
            .format(RecordOrder::Chronological),
    );
    params
}

#[test]
fn test_farsite_scenario() {
    let mut params = ParameterSet::new(ModelVariant::Farsite);
    params.farsite.start_time = Some("08 07 1000".to_string());

    let text = encode_input(&params, "farsite_run");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[1], "FARSITE INPUTS FILE VERSION 1.0");
    assert!(text.contains("FARSITE_START_TIME: 08 07 1000\n"));

    let tail: Vec<&str> = lines
        .iter()
        .copied()
        .skip_while(|l| *l != "# REQUESTED OUTPUTS")
        .skip(1)
        .collect();
    assert_eq!(
        tail,
        ["FLAMELENGTH:", "SPREADRATE:", "INTENSITY:", "HEATAREA:", "CROWNSTATE:"]
    );
    assert!(!text.contains("MTT_"));
    assert!(!text.contains("TREAT_"));
}

#[test]
fn test_block_count_matches_following_lines() {
    for variant in ModelVariant::ALL {
        let text = encode_input(&full_parameters(variant), "blocks");
        let lines: Vec<&str> = text.lines().collect();
        let mut blocks = 0;
        for (i, line) in lines.iter().enumerate() {
            let Some((key, value)) = line.split_once(": ") else {
                continue;
            };
            if !matches!(
                key,
                "FUEL_MOISTURES_DATA" | "RAWS" | "WEATHER_DATA" | "WIND_DATA" | "FARSITE_BURN_PERIODS"
            ) {
                continue;
            }
            blocks += 1;
            let count: usize = value.parse().unwrap();
            let following = lines[i + 1..].iter().take_while(|l| !l.is_empty()).count();
            assert_eq!(count, following, "{variant} {key}");
        }
        let expected = if variant == ModelVariant::Farsite { 5 } else { 4 };
        assert_eq!(blocks, expected, "{variant}");
    }
}

#[test]
fn test_chronological_blocks_are_sorted() {
    let text = encode_input(&full_parameters(ModelVariant::Farsite), "sorted");
    assert!(text.contains("FARSITE_BURN_PERIODS: 2\n08 07 1000 1800\n08 08 1000 1800\n\n"));
    assert!(text.contains("RAWS: 2\n2018 3 23 600 80 18 0 4 170 10\n2018 3 23 700"));
    assert!(text.contains("FUEL_MOISTURES_DATA: 2\n0 4 3 6 10 16\n1 4 3 6 10 16\n\n"));
}

#[test]
fn test_unset_fields_have_no_line() {
    for variant in ModelVariant::ALL {
        let params = ParameterSet::new(variant);
        let text = encode_input(&params, "sparse");
        for key in keys_for(variant) {
            assert!(
                !text.lines().any(|l| l.starts_with(&format!("{key}:"))),
                "{variant} wrote unset {key}"
            );
        }
    }
}

#[test]
fn test_keys_never_cross_variants() {
    for variant in ModelVariant::ALL {
        let text = encode_input(&full_parameters(variant), "cross");
        let own: Vec<&str> = keys_for(variant).collect();
        for line in keyed_lines(&text) {
            let key = line.split(':').next().unwrap();
            let is_output = OutputRequest::from(key) != OutputRequest::Custom(key.to_string());
            assert!(
                own.contains(&key) || is_output,
                "{variant} wrote foreign key {key}"
            );
        }
    }
}

#[test]
fn test_section_headers_do_not_depend_on_set_fields() {
    for variant in ModelVariant::ALL {
        let sparse = encode_input(&ParameterSet::new(variant), "a");
        let full = encode_input(&full_parameters(variant), "a");
        assert_eq!(headers(&sparse), section_headers(variant));
        assert_eq!(headers(&full), section_headers(variant));
    }
}

#[test]
fn test_spotting_seed_belongs_to_variant() {
    let mtt = encode_input(&full_parameters(ModelVariant::Mtt), "mtt");
    assert!(mtt.contains("SPOTTING_SEED: 4242\n"));
    let farsite = encode_input(&full_parameters(ModelVariant::Farsite), "farsite");
    assert!(farsite.contains("SPOTTING_SEED: 7\n"));
    let flammap = encode_input(&full_parameters(ModelVariant::FlamMap), "flammap");
    assert!(!flammap.contains("SPOTTING_SEED"));
}

#[test]
fn test_written_file_matches_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.input");
    let params = full_parameters(ModelVariant::Tom);

    let written = write_input_file(&params, &path).unwrap();
    assert_eq!(
        std::fs::read_to_string(written).unwrap(),
        encode_input(&params, "scenario")
    );
}
