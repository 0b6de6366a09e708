use maxspeeds_section::road_graph::{
    GeometryType, InMemoryRoadGraph, RoadDescription, RoadGraphDescription,
};
use maxspeeds_section::section::OwnedMaxspeedsSection;
use maxspeeds_section::{
    AnnotationParseError, FeatureIdToWayId, MaxspeedsConfig, RoadCategory, SpeedCatalogue,
    SpeedInUnits, Units, UrbanContext, build_maxspeeds_section, parse_feature_mapping,
    parse_maxspeeds,
};

fn road(feature_id: u32, category: RoadCategory, length_m: f64, in_city: bool) -> RoadDescription {
    RoadDescription {
        feature_id,
        category: Some(category),
        length_m,
        in_city,
        points_count: 2,
        one_way: false,
        car_road: true,
        geometry: GeometryType::Line,
    }
}

fn build(
    description: RoadGraphDescription,
    mapping: &str,
    table: &str,
) -> Option<OwnedMaxspeedsSection> {
    let graph = InMemoryRoadGraph::new(description).expect("Valid graph");
    let feature_to_way: FeatureIdToWayId = parse_feature_mapping(mapping).expect("Valid mapping");
    let maxspeeds = parse_maxspeeds(table).expect("Valid table");

    let (bytes, _) = build_maxspeeds_section(
        &graph,
        graph.features(),
        &feature_to_way,
        &maxspeeds,
        &MaxspeedsConfig::default(),
    )
    .expect("Encodable section");

    bytes.map(|bytes| OwnedMaxspeedsSection::try_from(bytes).expect("Decodable section"))
}

#[test]
fn explicit_speed_is_stored_as_is() {
    let section = build(
        RoadGraphDescription {
            roads: vec![road(0, RoadCategory::Motorway, 1000.0, false)],
            joints: vec![],
        },
        "0, 123",
        "123, kmh, 50",
    )
    .expect("One speed is stored");

    let catalogue = SpeedCatalogue::standard();
    let speed = section.get(0).expect("Feature 0 has a speed");
    assert_eq!(
        speed.forward,
        catalogue.to_macro(SpeedInUnits::new(50, Units::Metric))
    );
    assert_eq!(speed.backward, None);
    assert_eq!(section.header().feature_count(), 1);
}

#[test]
fn link_inherits_from_motorway() {
    let section = build(
        RoadGraphDescription {
            roads: vec![
                road(0, RoadCategory::Motorway, 1000.0, false),
                road(1, RoadCategory::MotorwayLink, 300.0, false),
            ],
            // The motorway ends where the link starts
            joints: vec![vec![(0, 1), (1, 0)]],
        },
        "0, 120\n1, 124",
        "120, kmh, 120\n124, kmh, 1000",
    )
    .expect("Two speeds are stored");

    let catalogue = SpeedCatalogue::standard();
    let link = section.get(1).expect("The link speed was resolved");
    assert_eq!(
        link.forward,
        catalogue.to_macro(SpeedInUnits::new(102, Units::Metric))
    );
    assert_eq!(
        section.get(0).map(|speed| speed.forward),
        Some(catalogue.to_macro(SpeedInUnits::new(120, Units::Metric)))
    );
}

#[test]
fn short_categories_get_no_default() {
    let section = build(
        RoadGraphDescription {
            roads: vec![
                road(0, RoadCategory::Residential, 1500.0, true),
                road(1, RoadCategory::Residential, 1500.0, true),
            ],
            joints: vec![],
        },
        "0, 1\n1, 2",
        "1, kmh, 30\n2, kmh, 20",
    )
    .expect("Two speeds are stored");

    assert_eq!(section.iter().count(), 2);
    assert_eq!(
        section.default_speed(RoadCategory::Residential, UrbanContext::Inside),
        None
    );
    assert!(section.default_speeds(UrbanContext::Inside).is_empty());
}

#[test]
fn long_categories_get_a_default() {
    let section = build(
        RoadGraphDescription {
            roads: vec![road(0, RoadCategory::Residential, 10_000.0, true)],
            joints: vec![],
        },
        "0, 1",
        "1, kmh, 20, 40",
    )
    .expect("One speed is stored");

    // 20 km in 3/4 hours, truncated to 26 and snapped to 25
    let catalogue = SpeedCatalogue::standard();
    assert_eq!(
        section.default_speeds(UrbanContext::Inside),
        vec![(
            RoadCategory::Residential,
            catalogue.to_macro(SpeedInUnits::new(25, Units::Metric))
        )]
    );
    assert_eq!(section.header().bidirectional_count(), 1);
}

#[test]
fn malformed_table_fails_the_run() {
    let error = parse_maxspeeds("123, kmh, 50\nabc, kmh, 50").expect_err("Non-numeric way ID");

    assert!(matches!(
        error,
        AnnotationParseError::MalformedLine { line: 2, .. }
    ));
}

#[test]
fn nothing_to_store_yields_no_section() {
    let section = build(
        RoadGraphDescription {
            roads: vec![road(0, RoadCategory::MotorwayLink, 1000.0, false)],
            joints: vec![],
        },
        "0, 1",
        "1, kmh, 1000",
    );

    assert!(section.is_none());
}
