mod common;

use std::collections::HashSet;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::json;
use webview_autofill::dom::{Document, Rect};
use webview_autofill::indexer::{collect_page_details, FieldIndexer, SelectInfo};
use webview_autofill::EngineConfig;

use common::login_page;

#[test]
fn fingerprints_are_unique_within_a_pass() {
    let mut doc = Document::new("https://example.com/");
    let body = doc.body();
    for i in 0..25 {
        let name = format!("field{i}");
        doc.append_element(body, "input", &[("name", name.as_str())]);
    }
    let select = doc.append_element(body, "select", &[]);
    doc.append_element(select, "option", &[("value", "a")]);

    let details = collect_page_details(&mut doc, "p1");
    let fingerprints: HashSet<&str> = details.fields.iter().map(|f| f.fingerprint.as_str()).collect();
    assert_eq!(details.fields.len(), 26);
    assert_eq!(fingerprints.len(), 26);
    assert!(fingerprints.contains("__p1__25__"));
}

#[test]
fn hidden_and_button_inputs_are_never_described() {
    let mut page = login_page("https://example.com/login");
    let body = page.doc.body();
    for control_type in ["submit", "reset", "button", "file", "image"] {
        page.doc.append_element(body, "input", &[("type", control_type)]);
    }
    let text = page.doc.append_element(body, "input", &[("type", "text")]);
    let select = page.doc.append_element(body, "select", &[]);

    let details = collect_page_details(&mut page.doc, "s");
    let types: Vec<&str> = details.fields.iter().map(|f| f.control_type.as_str()).collect();
    assert_eq!(types, vec!["email", "password", "checkbox", "text", "select-one"]);

    // Excluded controls still carry a fingerprint.
    assert_eq!(page.doc.fingerprint(page.csrf), Some("__s__3__"));
    assert!(details.fields.iter().any(|f| Some(f.fingerprint.as_str()) == page.doc.fingerprint(text)));
    assert!(details.fields.iter().any(|f| Some(f.fingerprint.as_str()) == page.doc.fingerprint(select)));
}

#[test]
fn element_numbers_count_described_fields_only() {
    let mut page = login_page("https://example.com/login");
    let details = collect_page_details(&mut page.doc, "s");
    let numbers: Vec<usize> = details.fields.iter().map(|f| f.element_index).collect();
    assert_eq!(numbers, vec![0, 1, 2]);
}

#[test]
fn placeholder_does_not_count_as_label_tag() {
    let mut page = login_page("https://example.com/login");
    let details = collect_page_details(&mut page.doc, "s");
    let password = &details.fields[1];
    assert_eq!(password.html_id.as_deref(), Some("password"));
    assert_eq!(password.label_tag, None);
    assert_eq!(password.placeholder.as_deref(), Some("password"));
}

#[test]
fn missing_maxlength_reports_sentinel() {
    let mut doc = Document::new("https://example.com/");
    let body = doc.body();
    doc.append_element(body, "input", &[]);
    doc.append_element(body, "input", &[("maxlength", "20")]);
    doc.append_element(body, "input", &[("maxlength", "-1")]);
    doc.append_element(body, "select", &[]);

    let details = collect_page_details(&mut doc, "s");
    let lengths: Vec<u32> = details.fields.iter().map(|f| f.max_length).collect();
    assert_eq!(lengths, vec![999, 20, 999, 999]);

    let custom = EngineConfig::builder().max_length_sentinel(512).build();
    let details = FieldIndexer::new(custom).collect(&mut doc, "t");
    assert_eq!(details.fields[0].max_length, 512);
}

#[test]
fn descriptor_serializes_with_wire_keys() {
    let mut page = login_page("https://example.com/login");
    let details = collect_page_details(&mut page.doc, "s1");

    assert_eq!(
        serde_json::to_value(&details.fields[0]).unwrap(),
        json!({
            "opid": "__s1__0__",
            "elementNumber": 0,
            "htmlID": "username",
            "htmlName": "username",
            "htmlClass": null,
            "rel": null,
            "type": "email",
            "value": "",
            "maxLength": 999,
            "autoCompleteType": "username",
            "selectInfo": null,
            "visible": true,
            "viewable": true,
            "label-tag": "emailaddress",
            "label-data": null,
            "label-aria": null,
            "placeholder": null,
            "label-top": null,
            "label-right": null,
            "label-left": "emailaddress",
            "form": {
                "formNumber": 0,
                "htmlName": "signin",
                "htmlID": "login",
                "htmlAction": "https://example.com/session",
                "htmlMethod": "post",
                "opid": "__form__s1__0__"
            }
        })
    );
}

#[test]
fn label_heuristics_each_report_independently() {
    let mut doc = Document::new("https://example.com/");
    let body = doc.body();
    let wrapper = doc.append_element(body, "label", &[]);
    doc.append_text(wrapper, "Account ID");
    let wrapped = doc.append_element(wrapper, "input", &[("data-label", "Customer No."), ("aria-label", "Account")]);
    let checkbox = doc.append_element(body, "input", &[("type", "checkbox")]);
    doc.append_text(body, " Keep me signed in ");

    let details = collect_page_details(&mut doc, "s");
    let first = &details.fields[0];
    assert_eq!(Some(first.fingerprint.as_str()), doc.fingerprint(wrapped));
    assert_eq!(first.label_tag.as_deref(), Some("accountid"));
    assert_eq!(first.label_data.as_deref(), Some("customerno"));
    assert_eq!(first.label_aria.as_deref(), Some("account"));
    assert_eq!(first.label_left.as_deref(), Some("accountid"));

    let second = &details.fields[1];
    assert_eq!(Some(second.fingerprint.as_str()), doc.fingerprint(checkbox));
    assert_eq!(second.label_tag, None);
    assert_eq!(second.label_right.as_deref(), Some("keepmesignedin"));
}

#[test]
fn label_top_reads_the_cell_above() {
    let mut doc = Document::new("https://example.com/");
    let body = doc.body();
    let table = doc.append_element(body, "table", &[]);
    let header = doc.append_element(table, "tr", &[]);
    for caption in ["User", "PIN"] {
        let cell = doc.append_element(header, "th", &[]);
        doc.append_text(cell, caption);
    }
    let row = doc.append_element(table, "tr", &[]);
    let mut inputs = Vec::new();
    for _ in 0..2 {
        let cell = doc.append_element(row, "td", &[]);
        inputs.push(doc.append_element(cell, "input", &[]));
    }

    let details = collect_page_details(&mut doc, "s");
    let tops: Vec<Option<&str>> = details.fields.iter().map(|f| f.label_top.as_deref()).collect();
    assert_eq!(tops, vec![Some("user"), Some("pin")]);
}

#[test]
fn viewability_hit_tests_the_top_left_corner() {
    let mut page = login_page("https://example.com/login");
    let body = page.doc.body();

    // Cookie banner over the password field.
    let banner = page.doc.append_element(body, "div", &[]);
    page.doc.set_rect(banner, Rect::new(0.0, 70.0, 1280.0, 60.0));
    page.doc.set_z_index(banner, 10);

    // Scrolled far below the fold.
    let below = page.doc.append_element(body, "input", &[("name", "below")]);
    page.doc.set_rect(below, Rect::new(20.0, 2000.0, 200.0, 24.0));

    // Hidden through an ancestor.
    let drawer = page.doc.append_element(body, "div", &[]);
    page.doc.set_display(drawer, "none");
    let hidden = page.doc.append_element(drawer, "input", &[("name", "hidden")]);
    page.doc.set_rect(hidden, Rect::new(20.0, 300.0, 200.0, 24.0));

    let details = collect_page_details(&mut page.doc, "s");
    let by_name = |name: &str| {
        details
            .fields
            .iter()
            .find(|f| f.html_name.as_deref() == Some(name))
            .unwrap()
    };

    assert!(by_name("username").visible && by_name("username").viewable);
    assert!(by_name("password").visible);
    assert!(!by_name("password").viewable);
    assert!(by_name("below").viewable);
    assert!(!by_name("hidden").visible);
    assert!(!by_name("hidden").viewable);
}

#[test]
fn covering_label_for_the_field_keeps_it_viewable() {
    let mut page = login_page("https://example.com/login");
    let body = page.doc.body();
    let floating = page.doc.append_element(body, "label", &[("for", "password")]);
    page.doc.set_rect(floating, Rect::new(20.0, 80.0, 240.0, 24.0));
    let stray = page.doc.append_element(body, "label", &[("for", "elsewhere")]);
    page.doc.set_rect(stray, Rect::new(20.0, 40.0, 240.0, 24.0));

    let details = collect_page_details(&mut page.doc, "s");
    assert!(!details.fields[0].viewable);
    assert!(details.fields[1].viewable);
}

#[test]
fn fields_of_one_form_share_a_descriptor() {
    let mut page = login_page("https://example.com/login");
    let body = page.doc.body();
    page.doc.append_element(body, "input", &[("form", "login"), ("name", "otp")]);
    let loose = page.doc.append_element(body, "input", &[("name", "search")]);

    let details = collect_page_details(&mut page.doc, "s");
    let form = details.fields[0].form.clone().unwrap();
    for field in &details.fields[1..4] {
        assert!(Rc::ptr_eq(&form, field.form.as_ref().unwrap()));
    }
    assert_eq!(details.fields[4].form, None);
    assert_eq!(page.doc.fingerprint(page.form), Some("__form__s__0__"));
    assert_eq!(page.doc.form_owner(loose), None);
}

#[test]
fn reindexing_with_a_new_salt_rekeys_everything() {
    let mut page = login_page("https://example.com/login");
    collect_page_details(&mut page.doc, "first");
    let details = collect_page_details(&mut page.doc, "second");

    assert_eq!(details.fields[0].fingerprint, "__second__0__");
    assert_eq!(page.doc.find_by_fingerprint("__first__0__"), None);
    let form = details.fields[0].form.as_ref().unwrap();
    assert_eq!(form.form_fingerprint, "__form__second__0__");
    assert_eq!(page.doc.fingerprint(page.form), Some("__form__second__0__"));
}

#[test]
fn select_options_are_reported_with_normalized_text() {
    let mut doc = Document::new("https://example.com/");
    let body = doc.body();
    let select = doc.append_element(body, "select", &[("name", "country")]);
    let us = doc.append_element(select, "option", &[("value", "us")]);
    doc.append_text(us, "United States");
    let ca = doc.append_element(select, "option", &[("value", "ca"), ("selected", "")]);
    doc.append_text(ca, "Canada");
    doc.append_element(body, "select", &[("name", "empty")]);

    let details = collect_page_details(&mut doc, "s");
    let country = &details.fields[0];
    assert_eq!(country.value, "ca");
    assert_eq!(
        country.select_options,
        Some(SelectInfo {
            options: vec![
                (Some("unitedstates".to_string()), "us".to_string()),
                (Some("canada".to_string()), "ca".to_string()),
            ]
        })
    );
    assert_eq!(details.fields[1].select_options, Some(SelectInfo { options: vec![] }));
    assert_eq!(details.fields[1].value, "");
}

#[test]
fn unmatched_select_value_clears_the_selection() {
    let mut doc = Document::new("https://example.com/");
    let body = doc.body();
    let select = doc.append_element(body, "select", &[("name", "plan")]);
    for value in ["basic", "pro"] {
        doc.append_element(select, "option", &[("value", value)]);
    }
    assert_eq!(doc.value(select).as_deref(), Some("basic"));

    doc.set_value(select, "enterprise");
    assert_eq!(doc.value(select).as_deref(), Some(""));
    assert_eq!(collect_page_details(&mut doc, "s").fields[0].value, "");

    doc.set_value(select, "pro");
    assert_eq!(doc.value(select).as_deref(), Some("pro"));
}
