use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use procureflow_cli::commands::{config, price, route, submit};
use serde_json::Value;
use tempfile::TempDir;

const OFFICE_DRAFT: &str = r#"{
    "title": "Office restock",
    "department": "IT",
    "priority": "high",
    "items": [
        { "description": "Printer paper", "quantity": 10, "unit_price": 12.5, "category": "office-supplies" },
        { "description": "Stapler", "quantity": 2, "unit_price": 10, "category": "office-supplies" }
    ]
}"#;

#[test]
fn price_reports_totals_rounded_at_output() {
    with_env(&[], || {
        let (_dir, path) = write_draft(OFFICE_DRAFT);
        let result = price::run(&path);
        assert_eq!(result.exit_code, 0, "expected successful pricing: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "price");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["pricing"]["totals"]["subtotal"], "145.00");
        assert_eq!(payload["data"]["pricing"]["totals"]["tax_amount"], "14.50");
        assert_eq!(payload["data"]["pricing"]["totals"]["grand_total"], "159.50");
        assert_eq!(payload["data"]["pricing"]["totals"]["currency"], "MYR");
        assert_eq!(payload["data"]["formatted"]["grand_total"], "RM159.50");
    });
}

#[test]
fn price_uses_configured_tax_rate() {
    with_env(&[("PROCUREFLOW_PRICING_TAX_RATE", "0.06")], || {
        let (_dir, path) = write_draft(OFFICE_DRAFT);
        let result = price::run(&path);
        assert_eq!(result.exit_code, 0, "expected successful pricing: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["pricing"]["totals"]["tax_amount"], "8.70");
        assert_eq!(payload["data"]["pricing"]["totals"]["grand_total"], "153.70");
    });
}

#[test]
fn price_rejects_negative_quantity_as_invalid_input() {
    with_env(&[], || {
        let (_dir, path) = write_draft(
            r#"{ "items": [ { "description": "Chairs", "quantity": -1, "unit_price": 100 } ] }"#,
        );
        let result = price::run(&path);
        assert_eq!(result.exit_code, 4, "expected domain validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn price_reports_unreadable_and_malformed_drafts() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let missing = price::run(&dir.path().join("absent.json"));
        assert_eq!(missing.exit_code, 3);
        assert_eq!(parse_payload(&missing.output)["error_class"], "input_read");

        let (_dir, path) = write_draft("{ not json");
        let malformed = price::run(&path);
        assert_eq!(malformed.exit_code, 3);
        assert_eq!(parse_payload(&malformed.output)["error_class"], "input_parse");
    });
}

#[test]
fn route_orders_manager_thresholds_then_admin() {
    with_env(&[], || {
        let result = route::run("Operations", "RM6,000.00");
        assert_eq!(result.exit_code, 0, "expected successful routing: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "route");
        assert_eq!(
            contacts(&payload),
            vec![
                "operations.manager@company.com",
                "finance.team@company.com",
                "ceo@company.com",
                "admin@company.com",
            ]
        );
        assert_eq!(payload["data"]["approval_chain"]["steps"][0]["kind"]["kind"], "department_manager");
        assert_eq!(payload["data"]["approval_chain"]["steps"][3]["kind"]["kind"], "system_administrator");
    });
}

#[test]
fn route_amount_equal_to_threshold_skips_that_tier() {
    with_env(&[], || {
        let result = route::run("IT", "1000");
        assert_eq!(result.exit_code, 0, "expected successful routing: {}", result.output);
        assert_eq!(
            contacts(&parse_payload(&result.output)),
            vec!["it.manager@company.com", "admin@company.com"]
        );
    });
}

#[test]
fn route_rejects_unknown_department_and_bad_amounts() {
    with_env(&[], || {
        let unknown = route::run("Legal", "100");
        assert_eq!(unknown.exit_code, 4);
        assert_eq!(parse_payload(&unknown.output)["error_class"], "unknown_department");

        let malformed = route::run("IT", "lots");
        assert_eq!(malformed.exit_code, 4);
        assert_eq!(parse_payload(&malformed.output)["error_class"], "invalid_input");

        let trailing_letter = route::run("IT", "5M");
        assert_eq!(trailing_letter.exit_code, 4);
        assert_eq!(parse_payload(&trailing_letter.output)["error_class"], "invalid_input");
    });
}

#[test]
fn domain_failures_carry_user_message_and_correlation_id() {
    with_env(&[], || {
        let unknown = parse_payload(&route::run("Legal", "100").output);
        assert_eq!(unknown["user_message"], "An unexpected internal error occurred.");
        assert!(unknown["correlation_id"].as_str().unwrap_or_default().starts_with("cli-route-"));
        assert!(unknown["message"].as_str().unwrap_or_default().contains("Legal"));

        let (_dir, path) = write_draft(
            r#"{ "items": [ { "description": "Chairs", "quantity": -1, "unit_price": 100 } ] }"#,
        );
        let invalid = parse_payload(&price::run(&path).output);
        assert_eq!(invalid["error_class"], "invalid_input");
        assert_eq!(
            invalid["user_message"],
            "The requisition could not be processed. Check its details and try again."
        );
        assert!(invalid["correlation_id"].as_str().unwrap_or_default().starts_with("cli-price-"));

        let ok = parse_payload(&route::run("IT", "100").output);
        assert!(ok.get("user_message").is_none());
        assert!(ok.get("correlation_id").is_none());
    });
}

#[test]
fn price_keeps_exact_decimal_prices_and_rejects_out_of_range_amounts() {
    with_env(&[], || {
        let (_dir, path) = write_draft(
            r#"{ "items": [ { "description": "Licences", "quantity": 3, "unit_price": "19.99" } ] }"#,
        );
        let result = price::run(&path);
        assert_eq!(result.exit_code, 0, "expected successful pricing: {}", result.output);
        assert_eq!(parse_payload(&result.output)["data"]["pricing"]["totals"]["subtotal"], "59.97");

        let (_dir, path) = write_draft(
            r#"{ "items": [ { "description": "Servers", "quantity": 10, "unit_price": 79228162514264337593543950335 } ] }"#,
        );
        let result = price::run(&path);
        assert_eq!(result.exit_code, 4, "expected domain validation failure code");
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
        assert!(payload["message"].as_str().unwrap_or_default().contains("items[0].unit_price"));
    });
}

#[test]
fn submit_creates_pending_requisition_and_notifies_chain() {
    with_env(&[], || {
        let (_dir, path) = write_draft(OFFICE_DRAFT);
        let result = submit::run(&path, "Jane Smith");
        assert_eq!(result.exit_code, 0, "expected successful submission: {}", result.output);

        let payload = parse_payload(&result.output);
        let requisition = &payload["data"]["requisition"];
        assert_eq!(payload["command"], "submit");
        assert_eq!(requisition["status"], "pending");
        assert_eq!(requisition["requestor"], "Jane Smith");
        assert!(requisition["id"].as_str().unwrap_or_default().starts_with("REQ-"));
        assert_eq!(requisition["totals"]["grand_total"], "159.50");
        assert_eq!(payload["data"]["notification_sent"], true);
        assert_eq!(
            payload["data"]["notification"]["subject"],
            format!(
                "New Purchase Requisition: {} - RM159.50",
                requisition["id"].as_str().unwrap_or_default()
            )
        );
    });
}

#[test]
fn submit_skips_notification_when_disabled() {
    with_env(&[("PROCUREFLOW_NOTIFICATIONS_ENABLED", "false")], || {
        let (_dir, path) = write_draft(OFFICE_DRAFT);
        let result = submit::run(&path, "Jane Smith");
        assert_eq!(result.exit_code, 0, "expected successful submission: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["notification_sent"], false);
        assert!(payload["data"]["notification"].is_null());
    });
}

#[test]
fn submit_rejects_incomplete_drafts() {
    with_env(&[], || {
        let (_dir, untitled) = write_draft(
            r#"{ "department": "IT", "items": [ { "description": "Mouse", "quantity": 1, "unit_price": 25, "category": "it-equipment" } ] }"#,
        );
        let result = submit::run(&untitled, "Jane Smith");
        assert_eq!(result.exit_code, 4);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
        assert!(payload["message"].as_str().unwrap_or_default().contains("title"));

        let (_dir, empty) = write_draft(r#"{ "title": "Nothing", "department": "IT", "items": [] }"#);
        let result = submit::run(&empty, "Jane Smith");
        assert_eq!(result.exit_code, 4);
        assert_eq!(parse_payload(&result.output)["error_class"], "empty_requisition");
    });
}

#[test]
fn config_reports_env_sources() {
    with_env(&[("PROCUREFLOW_LOG_LEVEL", "debug")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("- logging.level = debug (source: env (PROCUREFLOW_LOG_LEVEL))"));
        assert!(message.contains("- pricing.tax_rate = 0.10 (source: default)"));
        assert!(message.contains("IT=it.manager@company.com"));
    });
}

#[test]
fn commands_fail_fast_on_invalid_config() {
    with_env(&[("PROCUREFLOW_PRICING_TAX_RATE", "1.5")], || {
        let result = route::run("IT", "100");
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

fn write_draft(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("draft.json");
    fs::write(&path, contents).expect("draft written");
    (dir, path)
}

fn contacts(payload: &Value) -> Vec<String> {
    payload["data"]["approval_chain"]["steps"]
        .as_array()
        .map(|steps| {
            steps
                .iter()
                .filter_map(|step| step["contact"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PROCUREFLOW_PRICING_TAX_RATE",
        "PROCUREFLOW_APPROVALS_SYSTEM_ADMIN",
        "PROCUREFLOW_NOTIFICATIONS_ENABLED",
        "PROCUREFLOW_NOTIFICATIONS_SENDER",
        "PROCUREFLOW_LOGGING_LEVEL",
        "PROCUREFLOW_LOGGING_FORMAT",
        "PROCUREFLOW_LOG_LEVEL",
        "PROCUREFLOW_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
