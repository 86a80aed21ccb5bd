//! Live-browser tests. They need a local Chrome, so run them with
//! `cargo test -- --ignored`.

use webview_autofill::fill::FillScript;
use webview_autofill::AutofillBrowser;

const LOGIN_HTML: &str = "data:text/html,\
<form id='login' action='/session'>\
<label for='user'>Email</label><input id='user' type='email'>\
<input id='pass' type='password' placeholder='Password'>\
<input id='remember' type='checkbox'>\
<input type='hidden' name='csrf' value='x'>\
</form>\
<script>\
window.seen = [];\
for (const t of ['click','focus','keydown','keyup','keypress','input','change','blur']) {\
document.getElementById('user').addEventListener(t, () => window.seen.push(t));\
}\
</script>";

#[tokio::test]
#[ignore]
async fn test_collect_page_details() {
    let browser = AutofillBrowser::builder()
        .headless(true)
        .build()
        .await
        .expect("Failed to launch browser");
    let page = browser.new_page(LOGIN_HTML).await.expect("Failed to open page");

    let details = page.collect_page_details("live").await.expect("Failed to collect");
    let ids: Vec<Option<&str>> = details.fields.iter().map(|f| f.html_id.as_deref()).collect();
    assert_eq!(ids, vec![Some("user"), Some("pass"), Some("remember")]);
    assert_eq!(details.fields[0].label_tag.as_deref(), Some("email"));
    assert_eq!(details.fields[1].placeholder.as_deref(), Some("password"));

    let stored = page
        .evaluate("document.getElementById('pass').__webfillFingerprint")
        .await
        .expect("Failed to read fingerprint");
    assert_eq!(stored, "\"__live__1__\"");
}

#[tokio::test]
#[ignore]
async fn test_fill_replays_events_on_the_page() {
    let browser = AutofillBrowser::builder()
        .headless(true)
        .build()
        .await
        .expect("Failed to launch browser");
    let page = browser.new_page(LOGIN_HTML).await.expect("Failed to open page");

    let details = page.collect_page_details("live").await.expect("Failed to collect");
    let script = FillScript::parse(
        &serde_json::json!({"script": [
            {"operation": "fill_by_opid", "parameters": [details.fields[0].fingerprint, "alice@example.com"]},
            {"operation": "fill_by_opid", "parameters": [details.fields[2].fingerprint, "yes"]}
        ]})
        .to_string(),
    )
    .expect("Failed to parse script");

    let report = page.fill(&script).await.expect("Failed to fill");
    assert_eq!(report.touched.len(), 2);

    let value = page
        .evaluate("document.getElementById('user').value")
        .await
        .expect("Failed to read value");
    assert_eq!(value, "\"alice@example.com\"");
    let checked = page
        .evaluate("document.getElementById('remember').checked")
        .await
        .expect("Failed to read checkbox");
    assert_eq!(checked, "true");
    let seen = page
        .evaluate("window.seen.join(',')")
        .await
        .expect("Failed to read events");
    assert_eq!(seen, "\"click,focus,keydown,keyup,keypress,keydown,keyup,keypress,input,change,blur\"");
}

#[tokio::test]
#[ignore]
async fn test_execute_fill_script_rejects_garbage() {
    let browser = AutofillBrowser::builder()
        .headless(true)
        .build()
        .await
        .expect("Failed to launch browser");
    let page = browser.new_page(LOGIN_HTML).await.expect("Failed to open page");

    let response = page.execute_fill_script("null").await;
    assert!(!response.success);

    let response = page.execute_fill_script(r#"{"script": []}"#).await;
    assert!(response.success);
}

#[tokio::test]
#[ignore]
async fn test_navigate_then_collect() {
    let browser = AutofillBrowser::builder()
        .headless(true)
        .build()
        .await
        .expect("Failed to launch browser");
    let page = browser.new_page("about:blank").await.expect("Failed to open page");

    page.goto(LOGIN_HTML).await.expect("Failed to navigate");
    let url = page.url().await.expect("Failed to read URL");
    assert!(url.starts_with("data:text/html"), "{url}");

    let pages = browser.pages().await.expect("Failed to list pages");
    assert!(!pages.is_empty());

    let details = page.collect_page_details("nav").await.expect("Failed to collect");
    assert_eq!(details.fields.len(), 3);
}

#[tokio::test]
#[ignore]
async fn test_fill_skips_fields_the_page_replaced() {
    let browser = AutofillBrowser::builder()
        .headless(true)
        .build()
        .await
        .expect("Failed to launch browser");
    let page = browser.new_page(LOGIN_HTML).await.expect("Failed to open page");
    let details = page.collect_page_details("live").await.expect("Failed to collect");

    page.evaluate(
        "document.getElementById('user').addEventListener('change', () => {\
            const old = document.getElementById('pass');\
            const fresh = old.cloneNode();\
            old.replaceWith(fresh);\
        })",
    )
    .await
    .expect("Failed to install listener");

    let user = details.fields[0].fingerprint.clone();
    let pass = details.fields[1].fingerprint.clone();
    let script = FillScript::parse(
        &serde_json::json!({"script": [
            {"operation": "fill_by_opid", "parameters": [user, "alice@example.com"]},
            {"operation": "fill_by_opid", "parameters": [pass, "hunter2"]}
        ]})
        .to_string(),
    )
    .expect("Failed to parse script");

    let report = page.fill(&script).await.expect("Failed to fill");
    assert_eq!(report.touched, vec![user]);
    let value = page
        .evaluate("document.getElementById('pass').value")
        .await
        .expect("Failed to read value");
    assert_eq!(value, "\"\"");
}
