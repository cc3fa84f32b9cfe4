use serde_json::Value;

/// Fields that answer "what did this cost / pay", in priority order.
const PRIORITY_KEYS: [&str; 12] = [
    "total_after_tax_income",
    "after_tax_income",
    "total_tax",
    "annual_benefit",
    "net_annual",
    "total_withdrawals",
    "current_service_cost",
    "reduced_limit",
    "cpp",
    "gross_dividends",
    "ympe",
    "year",
];

/// Print just the key answer value from the output.
///
/// A projection prints its summary's headline figure; anything else looks
/// for a known field, then falls back to the first field.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);
    let target = result_obj
        .as_object()
        .and_then(|m| m.get("summary"))
        .unwrap_or(result_obj);

    if let Value::Object(map) = target {
        for key in &PRIORITY_KEYS {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(target));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
