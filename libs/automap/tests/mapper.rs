use std::any::type_name;

use automap::{MapError, Mapper, MapperConfig, Shape};
use pretty_assertions::assert_eq;

#[derive(Shape, Default, Debug, Clone, PartialEq)]
struct TestingStruct {
    name: String,
}

#[derive(Shape, Default, Debug, Clone, PartialEq)]
struct TestingStruct2 {
    name: String,
    second_name: String,
}

#[derive(Shape, Default, Debug, Clone, PartialEq)]
struct Unrelated {
    value: i64,
}

fn testing(name: &str) -> TestingStruct {
    TestingStruct {
        name: name.to_string(),
    }
}

fn mapped(name: &str) -> TestingStruct2 {
    TestingStruct2 {
        name: name.to_string(),
        second_name: format!("{name}-2"),
    }
}

fn routed() -> Mapper {
    let mapper = Mapper::new();
    mapper
        .register_route::<TestingStruct, TestingStruct2, _>(|src, dest| {
            dest.name = src.name.clone();
            dest.second_name = format!("{}-2", src.name);
            Ok(())
        })
        .expect("route");
    mapper
}

// ── Registration ────────────────────────────────────────────────

#[test]
fn registration_adds_pair_and_sequence_variants() {
    let mapper = Mapper::with_config(MapperConfig {
        builtin_routes: false,
        ..MapperConfig::default()
    });
    mapper
        .register_route::<TestingStruct, TestingStruct2, _>(|_, _| Ok(()))
        .expect("route");

    assert_eq!(mapper.route_count(), 9);
    assert!(mapper.has_route::<TestingStruct, TestingStruct2>());
    assert!(mapper.has_route::<Vec<TestingStruct>, Vec<TestingStruct2>>());
    assert!(mapper.has_route::<Vec<TestingStruct>, Vec<Option<TestingStruct2>>>());
    assert!(mapper.has_route::<Vec<Option<TestingStruct>>, Vec<TestingStruct2>>());
    assert!(mapper.has_route::<Vec<Option<TestingStruct>>, Vec<Option<TestingStruct2>>>());
    assert!(mapper.has_route::<Option<Vec<TestingStruct>>, Vec<TestingStruct2>>());
    assert!(mapper.has_route::<Option<Vec<TestingStruct>>, Vec<Option<TestingStruct2>>>());
    assert!(mapper.has_route::<Option<Vec<Option<TestingStruct>>>, Vec<TestingStruct2>>());
    assert!(
        mapper.has_route::<Option<Vec<Option<TestingStruct>>>, Vec<Option<TestingStruct2>>>()
    );
    assert!(!mapper.has_route::<TestingStruct2, TestingStruct>());
}

#[test]
fn builtin_routes_are_installed_with_the_first_route() {
    let mapper = Mapper::new();
    assert_eq!(mapper.route_count(), 0);

    mapper
        .register_route::<TestingStruct, TestingStruct2, _>(|_, _| Ok(()))
        .expect("route");
    assert!(mapper.has_route::<uuid::Uuid, uuid::Uuid>());
    assert!(mapper.has_route::<chrono::DateTime<chrono::Utc>, Option<chrono::DateTime<chrono::Utc>>>());
    // Two identity routes per builtin type, each with eight sequence variants.
    assert_eq!(mapper.route_count(), 9 + 2 * 18);
}

#[test]
fn pointer_shapes_are_rejected_at_registration() {
    let mapper = Mapper::new();

    let err = mapper
        .register_route::<Option<TestingStruct>, TestingStruct2, _>(|_, _| Ok(()))
        .expect_err("pointer source");
    assert!(matches!(err, MapError::InvalidShape(_)), "got {err:?}");

    let err = mapper
        .register_route::<TestingStruct, Option<Option<TestingStruct2>>, _>(|_, _| Ok(()))
        .expect_err("pointer to pointer destination");
    assert!(matches!(err, MapError::InvalidShape(_)), "got {err:?}");

    mapper
        .register_route::<TestingStruct, Option<TestingStruct2>, _>(|_, _| Ok(()))
        .expect("pointer destination");
    assert!(mapper.has_route::<TestingStruct, Option<TestingStruct2>>());
}

#[test]
fn registering_a_pair_again_replaces_the_route() {
    let mapper = routed();
    let before = mapper.route_count();
    mapper
        .register_route::<TestingStruct, TestingStruct2, _>(|_, dest| {
            dest.name = "replaced".to_string();
            Ok(())
        })
        .expect("route");

    assert_eq!(mapper.route_count(), before);
    let dest: TestingStruct2 = mapper.map_to(&testing("Test")).expect("map");
    assert_eq!(dest.name, "replaced");
}

// ── Map / MapTo ─────────────────────────────────────────────────

#[test]
fn map_into_existing_destination() {
    let mapper = routed();
    let mut dest = TestingStruct2::default();

    mapper.map(&testing("Test"), &mut dest).expect("map");
    assert_eq!(dest, mapped("Test"));

    mapper.map(&Some(testing("Ptr")), &mut dest).expect("map");
    assert_eq!(dest, mapped("Ptr"));
}

#[test]
fn map_to_from_value_and_pointer() {
    let mapper = routed();

    let from_value: TestingStruct2 = mapper.map_to(&testing("Test")).expect("map");
    assert_eq!(from_value, mapped("Test"));

    let from_pointer: TestingStruct2 = mapper.map_to(&Some(testing("Test"))).expect("map");
    assert_eq!(from_pointer, mapped("Test"));
}

#[test]
fn mapping_is_repeatable() {
    let mapper = routed();
    let src = testing("Same");
    let first: TestingStruct2 = mapper.map_to(&src).expect("map");
    let second: TestingStruct2 = mapper.map_to(&src).expect("map");
    assert_eq!(first, second);
}

#[test]
fn absent_and_double_pointer_sources_are_invalid() {
    let mapper = routed();

    let err = mapper
        .map_to::<TestingStruct2, _>(&None::<TestingStruct>)
        .expect_err("nil source");
    assert!(matches!(err, MapError::InvalidSource(_)), "got {err:?}");

    let err = mapper
        .map_to::<TestingStruct2, _>(&Some(Some(testing("Test"))))
        .expect_err("pointer to pointer");
    assert!(matches!(err, MapError::InvalidSource(_)), "got {err:?}");
}

#[test]
fn pointer_destination_is_invalid() {
    let mapper = Mapper::new();
    mapper
        .register_route::<TestingStruct, Option<TestingStruct2>, _>(|src, dest| {
            *dest = Some(mapped(&src.name));
            Ok(())
        })
        .expect("route");

    let mut dest: Option<TestingStruct2> = None;
    let err = mapper
        .map(&testing("Test"), &mut dest)
        .expect_err("pointer destination");
    assert!(matches!(err, MapError::InvalidDestination(_)), "got {err:?}");
    assert_eq!(dest, None);
}

#[test]
fn missing_route_names_both_types() {
    let mapper = routed();
    let err = mapper
        .map_to::<Unrelated, _>(&testing("Test"))
        .expect_err("no route");
    match err {
        MapError::RouteNotFound { from, to } => {
            assert_eq!(from, type_name::<TestingStruct>());
            assert_eq!(to, type_name::<Unrelated>());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn partial_destination_is_returned_with_the_error() {
    let mapper = Mapper::new();
    mapper
        .register_route::<TestingStruct, TestingStruct2, _>(|src, dest| {
            dest.name = src.name.clone();
            Err(MapError::custom("second name unavailable"))
        })
        .expect("route");

    let (dest, result) = mapper.map_to_partial::<TestingStruct2, _>(&testing("Half"));
    assert_eq!(dest.name, "Half");
    assert_eq!(dest.second_name, "");
    assert_eq!(
        result.expect_err("route failed").to_string(),
        "second name unavailable"
    );
}

// ── Sequences ───────────────────────────────────────────────────

#[test]
fn sequences_map_element_wise() {
    let mapper = routed();
    let src = vec![testing("a"), testing("b")];

    let values: Vec<TestingStruct2> = mapper.map_to(&src).expect("map");
    assert_eq!(values, vec![mapped("a"), mapped("b")]);

    let pointers: Vec<Option<TestingStruct2>> = mapper.map_to(&src).expect("map");
    assert_eq!(pointers, vec![Some(mapped("a")), Some(mapped("b"))]);

    let from_pointer: Vec<TestingStruct2> = mapper.map_to(&Some(src.clone())).expect("map");
    assert_eq!(from_pointer, vec![mapped("a"), mapped("b")]);

    let elements = vec![Some(testing("a")), Some(testing("b"))];
    let from_elements: Vec<TestingStruct2> = mapper.map_to(&elements).expect("map");
    assert_eq!(from_elements, vec![mapped("a"), mapped("b")]);
}

#[test]
fn empty_sequences_replace_the_destination() {
    let mapper = routed();

    let mut values = vec![mapped("stale")];
    mapper
        .map(&Vec::<TestingStruct>::new(), &mut values)
        .expect("map");
    assert!(values.is_empty());

    let mut pointers = vec![Some(mapped("stale"))];
    mapper
        .map(&Vec::<TestingStruct>::new(), &mut pointers)
        .expect("map");
    assert!(pointers.is_empty());

    let from_elements: Vec<TestingStruct2> = mapper
        .map_to(&Vec::<Option<TestingStruct>>::new())
        .expect("map");
    assert!(from_elements.is_empty());

    let from_pointer: Vec<Option<TestingStruct2>> = mapper
        .map_to(&Some(Vec::<Option<TestingStruct>>::new()))
        .expect("map");
    assert!(from_pointer.is_empty());
}

#[test]
fn absent_element_fails_with_its_position() {
    let mapper = routed();
    let src = vec![Some(testing("a")), None];

    let err = mapper
        .map_to::<Vec<TestingStruct2>, _>(&src)
        .expect_err("absent element");
    assert!(matches!(err, MapError::InvalidSource(_)), "got {err:?}");
    assert!(err.to_string().contains("element 1"), "got {err}");
}

#[test]
fn sequence_elements_count_toward_the_depth_limit() {
    let config = MapperConfig::parse("max_depth = 1").expect("config");
    let mapper = Mapper::with_config(config);
    mapper
        .register_route::<TestingStruct, TestingStruct2, _>(|_, _| Ok(()))
        .expect("route");

    mapper
        .map_to::<TestingStruct2, _>(&testing("flat"))
        .expect("one level");
    let err = mapper
        .map_to::<Vec<TestingStruct2>, _>(&vec![testing("nested")])
        .expect_err("two levels");
    assert!(matches!(err, MapError::DepthExceeded(1)), "got {err:?}");
}

// ── Sharing ─────────────────────────────────────────────────────

#[test]
fn mapper_is_shared_across_threads() {
    let mapper = routed();
    std::thread::scope(|scope| {
        for i in 0..4 {
            let mapper = &mapper;
            scope.spawn(move || {
                let name = format!("t{i}");
                let dest: TestingStruct2 = mapper.map_to(&testing(&name)).expect("map");
                assert_eq!(dest, mapped(&name));
            });
        }
    });
}

#[derive(Shape, Default, Debug, Clone, PartialEq)]
struct Line {
    sku: String,
}

#[derive(Shape, Default, Debug, Clone, PartialEq)]
struct LineDto {
    sku: String,
}

#[derive(Shape, Default, Debug, Clone, PartialEq)]
struct Order {
    lines: Vec<Line>,
}

#[derive(Shape, Default, Debug, Clone, PartialEq)]
struct OrderDto {
    lines: Vec<LineDto>,
    count: i32,
}

#[test]
fn global_routes_can_map_through_the_global_mapper() {
    automap::register_route::<Line, LineDto, _>(|src, dest| {
        dest.sku = src.sku.to_uppercase();
        Ok(())
    })
    .expect("line route");
    automap::register_route::<Order, OrderDto, _>(|src, dest| {
        dest.lines = automap::map_to(&src.lines)?;
        dest.count = i32::try_from(src.lines.len()).map_err(|e| MapError::custom(e.to_string()))?;
        Ok(())
    })
    .expect("order route");

    let order = Order {
        lines: vec![
            Line {
                sku: "a-1".to_string(),
            },
            Line {
                sku: "b-2".to_string(),
            },
        ],
    };
    let dto: OrderDto = automap::map_to(&order).expect("map");
    assert_eq!(
        dto,
        OrderDto {
            lines: vec![
                LineDto {
                    sku: "A-1".to_string(),
                },
                LineDto {
                    sku: "B-2".to_string(),
                },
            ],
            count: 2,
        }
    );
    assert!(automap::global().has_route::<Vec<Order>, Vec<OrderDto>>());
}
