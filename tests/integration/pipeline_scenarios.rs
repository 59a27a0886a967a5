//! End-to-end pipeline runs over fake capabilities.

use super::test_utils::{test_config, FakeWarehouse, Fakes, ORDERS_PLAN};
use warehouse_coder::error::CoderError;
use warehouse_coder::orchestrator::{RunOutcome, StepDisposition};
use warehouse_coder::plan::StepKind;
use warehouse_coder::retrieval::SearchFilter;
use warehouse_coder::warehouse::Binding;

#[tokio::test]
async fn submit_plans_then_repairs_a_failing_step() {
    let fakes = Fakes::new(
        &[
            ORDERS_PLAN,
            "```sql\nCREATE TABLE ORDERS (ID INT, AMOUNT NUMBER);\n```",
            "CREATE VIEW V_AMOUNTS AS SELECT BAD_COLUMN FROM ORDERS;",
            "CREATE VIEW V_AMOUNTS AS SELECT AMOUNT FROM ORDERS;",
        ],
        FakeWarehouse::new().failing_on("BAD_COLUMN", "invalid identifier 'BAD_COLUMN'"),
    );
    let pipeline = fakes.pipeline(test_config());

    let (plan, report) = pipeline
        .submit("track order amounts", &SearchFilter::empty(), None)
        .await
        .unwrap();

    assert_eq!(plan.len(), 3);
    assert_eq!(plan.steps()[0].kind(), StepKind::Documentation);
    assert_eq!(report.outcome, RunOutcome::Complete);
    assert_eq!(report.steps[0].disposition, StepDisposition::NotExecuted);
    assert_eq!(report.steps[1].attempts_used, 1);
    assert_eq!(report.steps[2].attempts_used, 2);
    assert!(report.ensure_complete().is_ok());

    assert_eq!(
        fakes.warehouse.statements(),
        vec![
            "CREATE TABLE ORDERS (ID INT, AMOUNT NUMBER)".to_string(),
            "CREATE VIEW V_AMOUNTS AS SELECT BAD_COLUMN FROM ORDERS".to_string(),
            "CREATE VIEW V_AMOUNTS AS SELECT AMOUNT FROM ORDERS".to_string(),
        ]
    );

    let prompts = fakes.completion.prompts();
    assert_eq!(prompts.len(), 4);
    assert!(prompts[0].contains("track order amounts"));
    let repair_prompt = &prompts[3];
    assert!(repair_prompt.contains("CREATE TABLE ORDERS (ID INT, AMOUNT NUMBER);"));
    assert!(repair_prompt.contains("invalid identifier 'BAD_COLUMN'"));

    // planning plus one retrieval per code generation attempt
    assert_eq!(fakes.search.queries().len(), 4);
}

#[tokio::test]
async fn exhausted_step_does_not_stop_later_steps() {
    let fakes = Fakes::new(
        &[
            "CREATE TABLE ORDERS (ID INT, AMOUNT NUMBER, BROKEN);",
            "CREATE TABLE ORDERS (ID INT, AMOUNT NUMBER, BROKEN);",
            "CREATE TABLE ORDERS (ID INT, AMOUNT NUMBER, BROKEN);",
            "CREATE VIEW V_AMOUNTS AS SELECT 1 AS AMOUNT;",
        ],
        FakeWarehouse::new().failing_on("BROKEN", "syntax error"),
    );
    let pipeline = fakes.pipeline(test_config());
    let plan = warehouse_coder::plan::Plan::from_yaml(ORDERS_PLAN).unwrap();

    let report = pipeline
        .execute(&plan, &SearchFilter::empty(), Some(3))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Partial);
    assert_eq!(report.steps[1].disposition, StepDisposition::Exhausted);
    assert_eq!(report.steps[1].attempts.len(), 3);
    assert_eq!(report.steps[2].disposition, StepDisposition::Resolved);
    match report.ensure_complete() {
        Err(CoderError::StepExhausted { step, attempts }) => {
            assert_eq!(step, "Create orders table");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn generate_never_touches_the_warehouse() {
    let fakes = Fakes::new(
        &["CREATE TABLE T (A INT);\n-- seed\nINSERT INTO T VALUES (1);"],
        FakeWarehouse::new(),
    );
    let generated = fakes
        .pipeline(test_config())
        .generate("create and seed T", &SearchFilter::empty(), None)
        .await
        .unwrap();

    assert_eq!(generated.statements.len(), 2);
    assert!(generated.statements[1].ends_with("INSERT INTO T VALUES (1)"));
    assert!(fakes.warehouse.statements().is_empty());
}

#[tokio::test]
async fn document_generates_and_stores_through_the_procedure() {
    let fakes = Fakes::new(
        &["generated_docs:\n  - name: Orders\n    category: Data model\n    markdown: \"# Orders\"\n"],
        FakeWarehouse::new(),
    );
    let (documents, stored) = fakes
        .pipeline(test_config())
        .document("Orders hold an id and an amount.", true)
        .await
        .unwrap();

    assert_eq!(documents.len(), 1);
    assert_eq!(stored, 1);
    let statements = fakes.warehouse.statements();
    assert!(statements[0].starts_with("SELECT DISTINCT CATEGORY"));
    assert!(statements[1].starts_with("CALL SNOWFLAKE_CODER.APP.SPLIT_TEXT_AND_STORE"));
    assert_eq!(
        fakes.warehouse.bindings()[1],
        vec![
            Binding::text("# Orders"),
            Binding::text("Data model"),
            Binding::text("Orders"),
        ]
    );
}

#[tokio::test]
async fn unparseable_plan_aborts_submit() {
    let fakes = Fakes::new(&["Here is my plan: do things."], FakeWarehouse::new());
    let result = fakes
        .pipeline(test_config())
        .submit("idea", &SearchFilter::empty(), None)
        .await;
    assert!(matches!(result, Err(CoderError::PlanParse(_))));
    assert!(fakes.warehouse.statements().is_empty());
}
