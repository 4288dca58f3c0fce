//! End-to-end validation runs against in-memory remote services.

use pretty_assertions::assert_eq;
use recsel_check::{
    Binding, CheckConfig, CheckError, DeviceState, ErrorDescriptor, ValidationCoordinator,
};
use recsel_selection::{fields, GroupMap};
use recsel_test_utils::{
    group_map, preselected_record, setup_test_logging, MockBus, MockDevice, MockDirectory,
    MockRegistry,
};
use serde_json::json;
use std::sync::Arc;

struct World {
    directory: Arc<MockDirectory>,
    bus: Arc<MockBus>,
    coordinator: ValidationCoordinator,
}

fn world(directory: MockDirectory, registry: MockRegistry, bus: MockBus, workers: i32) -> World {
    setup_test_logging();
    let directory = Arc::new(directory);
    let bus = Arc::new(bus);
    let coordinator = ValidationCoordinator::new(directory.clone(), Arc::new(registry), bus.clone())
        .with_config(CheckConfig::new().with_workers(workers));
    World {
        directory,
        bus,
        coordinator,
    }
}

fn beamline() -> (MockDirectory, MockRegistry, MockBus) {
    let directory = MockDirectory::new()
        .with_component(
            "slit1",
            &[
                ("slit1_gap", Some(Binding::device("p09/slit/1/Gap"))),
                ("slit1_offset", Some(Binding::device("p09/slit/1/Offset"))),
            ],
        )
        .with_component(
            "pilatus",
            &[("pilatus_frame", Some(Binding::device("p09/pilatus/1/LastImage")))],
        )
        .with_component("counters", &[("exp_c01", Some(Binding::client("exp_c01")))])
        .with_component("scanned", &[("ghost", Some(Binding::client("exp_c99")))])
        .with_datasource("beamcurrent", Some(Binding::device("p09/ring/1/Current")))
        .with_datasource("sample_name", Some(Binding::other("PYEVAL", "ds.result = 'x'")))
        .with_datasource("mot01", None);
    let registry = MockRegistry::new().with_channel("exp_c01", "expchan/ct/1", "expchan/ct/1/Value");
    let bus = MockBus::new()
        .with_device(
            "p09/slit/1",
            MockDevice::healthy()
                .with_attribute("Gap", json!(2.5))
                .with_attribute("Offset", json!(0.0)),
        )
        .with_device(
            "p09/pilatus/1",
            MockDevice::healthy()
                .with_state(DeviceState::Fault)
                .with_attribute("LastImage", json!([1, 2, 3])),
        )
        .with_device("expchan/ct/1", MockDevice::healthy())
        .with_device(
            "p09/ring/1",
            MockDevice::healthy().with_attribute("Current", json!(99.8)),
        )
        .with_device("mot01", MockDevice::healthy().with_attribute("Position", json!(1.2)));
    (directory, registry, bus)
}

#[tokio::test]
async fn one_healthy_one_faulty_component() {
    let (directory, registry, bus) = beamline();
    let world = world(directory, registry, bus, 2);
    let components = group_map(&[("slit1", Some(true)), ("pilatus", Some(true))]);
    let mut errors = Vec::new();

    let outcome = world
        .coordinator
        .validate(&components, &GroupMap::new(), &mut errors)
        .await
        .unwrap();

    assert_eq!(
        errors,
        vec![ErrorDescriptor {
            component: Some("pilatus".into()),
            datasource: Some("pilatus_frame".into()),
            message: "FAULT STATE".into(),
        }]
    );
    assert_eq!(
        outcome.components,
        group_map(&[("slit1", Some(true)), ("pilatus", None)])
    );
    assert_eq!(outcome.components_json(), r#"{"slit1":true,"pilatus":null}"#);
    assert_eq!(outcome.report.groups_checked, 2);
    assert_eq!(outcome.report.groups_failed, 1);
    assert_eq!(outcome.report.workers_spawned, 2);
}

#[tokio::test]
async fn missing_component_fails_without_device_call() {
    let (directory, registry, bus) = beamline();
    let world = world(directory, registry, bus, 4);
    let components = group_map(&[("undulator", None)]);
    let mut errors = Vec::new();

    let outcome = world
        .coordinator
        .validate(&components, &GroupMap::new(), &mut errors)
        .await
        .unwrap();

    assert_eq!(world.bus.connect_count(), 0);
    assert_eq!(world.directory.expansion_count(), 0);
    assert_eq!(outcome.components, group_map(&[("undulator", None)]));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].component.as_deref(), Some("undulator"));
    assert_eq!(errors[0].datasource, None);
    assert_eq!(errors[0].message, "Component not available in the directory");
    assert_eq!(outcome.report.synthetic_failures, 1);
    assert_eq!(outcome.report.workers_spawned, 0);
}

#[tokio::test]
async fn inactive_names_are_neither_checked_nor_changed() {
    let (directory, registry, bus) = beamline();
    let world = world(directory, registry, bus, 1);
    let components = group_map(&[("pilatus", Some(false)), ("slit1", None)]);
    let datasources = group_map(&[("beamcurrent", Some(false))]);
    let mut errors = Vec::new();

    let outcome = world
        .coordinator
        .validate(&components, &datasources, &mut errors)
        .await
        .unwrap();

    assert!(errors.is_empty());
    assert_eq!(
        outcome.components,
        group_map(&[("pilatus", Some(false)), ("slit1", Some(true))])
    );
    assert_eq!(outcome.datasources, datasources);
    assert!(world.bus.connects().iter().all(|address| address == "p09/slit/1"));
}

#[tokio::test]
async fn client_datasources_resolve_through_registry() {
    let (directory, registry, bus) = beamline();
    let world = world(directory, registry, bus, 0);
    let components = group_map(&[("counters", Some(true)), ("scanned", Some(true))]);
    let mut errors = Vec::new();

    let outcome = world
        .coordinator
        .validate(&components, &GroupMap::new(), &mut errors)
        .await
        .unwrap();

    assert_eq!(world.bus.connects(), vec!["expchan/ct/1".to_string()]);
    assert_eq!(
        outcome.components,
        group_map(&[("counters", Some(true)), ("scanned", None)])
    );
    assert_eq!(
        errors,
        vec![ErrorDescriptor {
            component: Some("scanned".into()),
            datasource: Some("ghost".into()),
            message: "Channel not defined on the bus".into(),
        }]
    );
}

#[tokio::test]
async fn standalone_datasources() {
    let (directory, registry, bus) = beamline();
    let world = world(directory, registry, bus, 3);
    let datasources = group_map(&[
        ("beamcurrent", Some(true)),
        ("sample_name", None),
        ("mot01", Some(true)),
        ("vanished", Some(true)),
    ]);
    let mut errors = Vec::new();

    let outcome = world
        .coordinator
        .validate(&GroupMap::new(), &datasources, &mut errors)
        .await
        .unwrap();

    assert_eq!(
        outcome.datasources,
        group_map(&[
            ("beamcurrent", Some(true)),
            ("sample_name", Some(true)),
            ("mot01", Some(true)),
            ("vanished", None),
        ])
    );
    assert_eq!(
        errors,
        vec![ErrorDescriptor {
            component: None,
            datasource: Some("vanished".into()),
            message: "DataSource not available in the directory".into(),
        }]
    );
    let mut connects = world.bus.connects();
    connects.sort();
    assert_eq!(connects, vec!["mot01".to_string(), "p09/ring/1".to_string()]);
}

#[tokio::test]
async fn errors_follow_plan_order() {
    let (directory, registry, bus) = beamline();
    let world = world(directory, registry, bus, 8);
    let components = group_map(&[
        ("scanned", Some(true)),
        ("pilatus", Some(true)),
        ("missing", Some(true)),
    ]);
    let datasources = group_map(&[("vanished", None)]);
    let mut errors = vec![ErrorDescriptor {
        component: None,
        datasource: None,
        message: "earlier".into(),
    }];

    world
        .coordinator
        .validate(&components, &datasources, &mut errors)
        .await
        .unwrap();

    let order: Vec<_> = errors
        .iter()
        .map(|e| e.component.clone().or_else(|| e.datasource.clone()).unwrap_or_default())
        .collect();
    assert_eq!(order, vec!["", "scanned", "pilatus", "missing", "vanished"]);
}

#[tokio::test]
async fn unreachable_services_abort_the_run() {
    let (directory, _, bus) = beamline();
    let world_a = world(directory, MockRegistry::new().unavailable(), bus, 1);
    let mut errors = Vec::new();
    let err = world_a
        .coordinator
        .validate(&group_map(&[("slit1", None)]), &GroupMap::new(), &mut errors)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::RegistryUnavailable(_)));

    let (_, registry, bus) = beamline();
    let world_b = world(MockDirectory::new().unavailable(), registry, bus, 1);
    let err = world_b
        .coordinator
        .validate(&group_map(&[("slit1", None)]), &GroupMap::new(), &mut errors)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::DirectoryUnavailable(_)));
    assert!(err.is_remote());
    assert!(errors.is_empty());
    assert_eq!(world_b.bus.connect_count(), 0);
}

#[tokio::test]
async fn validate_record_writes_preselection_back() {
    let (directory, registry, bus) = beamline();
    let world = world(directory, registry, bus, 2);
    let mut record = preselected_record(
        &[("slit1", None), ("pilatus", Some(true)), ("detector2", Some(false))],
        &[("beamcurrent", None)],
    );
    let mut errors = Vec::new();

    let report = world
        .coordinator
        .validate_record(&mut record, &mut errors)
        .await
        .unwrap();

    assert_eq!(report.groups_failed, 1);
    assert_eq!(
        record.text(fields::COMPONENT_PRESELECTION),
        Some(r#"{"slit1":true,"pilatus":null,"detector2":false}"#)
    );
    assert_eq!(
        record.text(fields::DATASOURCE_PRESELECTION),
        Some(r#"{"beamcurrent":true}"#)
    );
}

#[tokio::test]
async fn malformed_preselection_is_reported() {
    let (directory, registry, bus) = beamline();
    let world = world(directory, registry, bus, 2);
    let mut record = preselected_record(&[], &[]);
    record.set(fields::COMPONENT_PRESELECTION, json!("{not json"));

    let err = world
        .coordinator
        .validate_record(&mut record, &mut Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckError::Selection(_)));
    assert_eq!(world.bus.connect_count(), 0);
}

#[tokio::test]
async fn components_without_device_work() {
    let directory = MockDirectory::new()
        .with_component(
            "metadata",
            &[
                ("title", Some(Binding::other("PYEVAL", "ds.result = 'run'"))),
                ("operator", Some(Binding::other("DB", "SELECT name"))),
            ],
        )
        .with_component("empty", &[]);
    let world = world(directory, MockRegistry::new(), MockBus::new(), 2);
    let components = group_map(&[("metadata", None), ("empty", None)]);
    let mut errors = Vec::new();

    let outcome = world
        .coordinator
        .validate(&components, &GroupMap::new(), &mut errors)
        .await
        .unwrap();

    assert!(errors.is_empty());
    assert_eq!(
        outcome.components,
        group_map(&[("metadata", Some(true)), ("empty", Some(true))])
    );
    assert_eq!(outcome.report.groups_checked, 1);
    assert_eq!(outcome.report.synthetic_failures, 0);
    assert_eq!(outcome.report.workers_spawned, 1);
    assert_eq!(world.directory.expansion_count(), 2);
    assert_eq!(world.bus.connect_count(), 0);
}

#[tokio::test]
async fn standalone_client_datasource_with_unknown_channel() {
    let (directory, registry, bus) = beamline();
    let directory = directory.with_datasource("lost_counter", Some(Binding::client("exp_c42")));
    let world = world(directory, registry, bus, 2);
    let datasources = group_map(&[("lost_counter", Some(true))]);
    let mut errors = Vec::new();

    let outcome = world
        .coordinator
        .validate(&GroupMap::new(), &datasources, &mut errors)
        .await
        .unwrap();

    assert_eq!(
        errors,
        vec![ErrorDescriptor {
            component: None,
            datasource: Some("lost_counter".into()),
            message: "Channel not defined on the bus".into(),
        }]
    );
    assert_eq!(outcome.datasources, group_map(&[("lost_counter", None)]));
    assert_eq!(outcome.report.synthetic_failures, 1);
    assert_eq!(outcome.report.workers_spawned, 0);
    assert_eq!(world.bus.connect_count(), 0);
}
