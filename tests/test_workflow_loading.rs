use nosf_workflow_sim::{
    domain::utils::id::TaskName,
    error::{ConversionError, Error},
    load_config, load_workflow,
};

fn data_path(relative: &str) -> String {
    format!("{}/data/{}", env!("CARGO_MANIFEST_DIR"), relative)
}

#[test]
fn test_load_config() {
    let config = load_config(data_path("test/test_config_01.json")).unwrap();

    assert_eq!(config.max_vms, 2);
    assert_eq!(config.bandwidth_mbps, 8.0);
    assert_eq!(config.deadline_multiplier, 3.0);
    assert_eq!(config.vm_types.len(), 2);
    assert_eq!(config.vm_types[0].id.as_str(), "cheap");
    assert_eq!(config.vm_types[1].processing_capacity, 2.0);
    assert_eq!(config.seed, None);
}

#[test]
fn test_load_diamond_workflow() {
    let config = load_config(data_path("test/test_config_01.json")).unwrap();
    let workflow = load_workflow(data_path("test/test_workflow_loading_01.json"), &config).unwrap();

    assert_eq!(workflow.name.as_str(), "Diamond-01");
    assert_eq!(workflow.arrival_time, 5.0);
    assert_eq!(workflow.tasks.len(), 4);

    let key = |name: &str| workflow.tasks.key_for_name(&TaskName::new(name)).unwrap();
    let (a, b, c, d) = (key("A"), key("B"), key("C"), key("D"));

    // Topology
    assert_eq!(workflow.entry_tasks(), vec![a]);
    assert_eq!(workflow.exit_tasks(), vec![d]);
    assert_eq!(workflow.successors(a), &[b, c]);
    assert_eq!(workflow.predecessors(d), &[b, c]);

    // Transfer times: 1 MB over 8 Mbps is one second, C has an explicit override
    let task_a = &workflow.tasks[a];
    assert!((task_a.data_transfer_time - 1.0).abs() < 1e-9);
    assert!((task_a.data_transfer_time_to(b) - 1.0).abs() < 1e-9);
    assert_eq!(task_a.data_transfer_time_to(c), 3.0);
    assert_eq!(workflow.tasks[c].data_transfer_time, 0.5);
    assert_eq!(workflow.tasks[d].data_transfer_time, 0.0);

    // Variance defaults to zero, estimate adds one standard deviation
    assert_eq!(workflow.tasks[b].estimated_execution_time(), 5.0);
    assert_eq!(workflow.tasks[d].variance_execution_time, 0.0);

    // Deadline derived from the critical path A -> C -> D
    assert_eq!(workflow.critical_path_length(), 11.0);
    assert_eq!(workflow.deadline, 5.0 + 3.0 * 11.0);
}

#[test]
fn test_load_sample_workflows() {
    let config = load_config(data_path("simulation_config.json")).unwrap();

    let montage = load_workflow(data_path("workflows/montage_9.json"), &config).unwrap();
    assert_eq!(montage.tasks.len(), 9);
    assert_eq!(montage.entry_tasks().len(), 3);
    assert_eq!(montage.exit_tasks().len(), 1);
    assert!(montage.deadline > montage.critical_path_length());

    let cybershake = load_workflow(data_path("workflows/cybershake_6.json"), &config).unwrap();
    assert_eq!(cybershake.arrival_time, 30.0);
    assert_eq!(cybershake.deadline, 400.0);
    assert_eq!(cybershake.entry_task(), cybershake.tasks.key_for_name(&TaskName::new("ExtractSGT-1")));
}

#[test]
fn test_cyclic_workflow_is_rejected() {
    let config = load_config(data_path("test/test_config_01.json")).unwrap();
    let result = load_workflow(data_path("test/test_workflow_cyclic.json"), &config);

    match result {
        Err(Error::WorkflowConstructionError(ConversionError::CyclicWorkflow(name))) => assert_eq!(name, "Cyclic-01"),
        other => panic!("expected a cycle error, got {:?}", other),
    }
}

#[test]
fn test_unknown_parent_is_rejected() {
    let config = load_config(data_path("test/test_config_01.json")).unwrap();
    let result = load_workflow(data_path("test/test_workflow_unknown_parent.json"), &config);

    match result {
        Err(Error::WorkflowConstructionError(ConversionError::UnknownTask { workflow, task })) => {
            assert_eq!(workflow, "Broken-01");
            assert_eq!(task, "Z");
        }
        other => panic!("expected an unknown task error, got {:?}", other),
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = load_config(data_path("test/test_config_invalid.json"));
    assert!(matches!(result, Err(Error::ConfigurationError(ConversionError::InvalidConfiguration(_)))));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let result = load_config(data_path("test/does_not_exist.json"));
    assert!(matches!(result, Err(Error::IoError(_))));
}
