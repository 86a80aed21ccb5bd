use std::time::Duration;

use tracing_subscriber::EnvFilter;
use webview_autofill::fill::FillScript;
use webview_autofill::AutofillBrowser;

#[tokio::main]
async fn main() -> webview_autofill::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let browser = AutofillBrowser::builder().headless(true).build().await?;
    let page = browser.new_page("https://httpbin.org/forms/post").await?;
    page.wait_for_selector("form").await?;

    let details = page.collect_page_details("demo").await?;
    println!("Found {} fillable fields on {}:", details.fields.len(), details.url);
    for field in &details.fields {
        println!(
            "  {} (type={}, name={})",
            field.fingerprint,
            field.control_type,
            field.html_name.as_deref().unwrap_or("-")
        );
    }

    let fingerprint_of = |name: &str| {
        details
            .fields
            .iter()
            .find(|f| f.html_name.as_deref() == Some(name))
            .map(|f| f.fingerprint.clone())
    };
    let mut operations = Vec::new();
    if let Some(fp) = fingerprint_of("custname") {
        operations.push(serde_json::json!({"operation": "fill_by_opid", "parameters": [fp, "Autofill Demo"]}));
    }
    if let Some(fp) = fingerprint_of("custemail") {
        operations.push(serde_json::json!({"operation": "fill_by_opid", "parameters": [fp, "demo@example.com"]}));
    }
    operations.push(serde_json::json!({"operation": "fill_by_query", "parameters": ["input[value='cheese']", "yes"]}));

    let payload = serde_json::json!({
        "script": operations,
        "properties": {"delay_between_operations": 250},
    });
    let script = FillScript::parse(&payload.to_string())?;
    let report = page.fill(&script).await?;
    println!("Touched {} fields", report.touched.len());

    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
