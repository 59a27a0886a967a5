//! Plan document parsing through the public API.

use super::test_utils::ORDERS_PLAN;
use warehouse_coder::plan::{ObjectType, Plan, StepKind};

#[test]
fn saved_plan_round_trips_through_yaml() {
    let plan = Plan::from_yaml(ORDERS_PLAN).unwrap();
    assert_eq!(plan.len(), 3);
    assert_eq!(plan.code_step_count(), 2);
    assert_eq!(plan.steps()[2].target_object().object_type, ObjectType::View);

    let reparsed = Plan::from_yaml(&plan.to_yaml().unwrap()).unwrap();
    let names: Vec<&str> = reparsed.steps().iter().map(|s| s.name()).collect();
    assert_eq!(
        names,
        vec!["Describe the model", "Create orders table", "Create amount view"]
    );
    assert_eq!(reparsed.steps()[0].kind(), StepKind::Documentation);
}

#[test]
fn fenced_plan_with_extra_keys_is_accepted() {
    let fenced = format!("```yaml\n{}  # trailing comment\n```", ORDERS_PLAN.replace(
        "objective: Store orders",
        "objective: Store orders\n    owner: data team",
    ));
    let plan = Plan::from_yaml(&fenced).unwrap();
    assert_eq!(plan.steps()[1].objective(), "Store orders");
}

#[test]
fn empty_step_list_is_rejected() {
    assert!(Plan::from_yaml("steps: []\n").is_err());
}
