#![allow(dead_code)]

use webview_autofill::dom::{Document, NodeId, Rect};

pub struct LoginPage {
    pub doc: Document,
    pub form: NodeId,
    pub username: NodeId,
    pub password: NodeId,
    pub remember: NodeId,
    pub csrf: NodeId,
    pub submit: NodeId,
}

/// A laid-out sign-in form: labelled email field, password with only a
/// placeholder, a "Remember me" checkbox, a hidden token and a submit button.
pub fn login_page(url: &str) -> LoginPage {
    let mut doc = Document::new(url);
    doc.set_viewport(1280.0, 800.0);
    let body = doc.body();
    doc.set_rect(body, Rect::new(0.0, 0.0, 1280.0, 800.0));

    let form = doc.append_element(
        body,
        "form",
        &[("id", "login"), ("name", "signin"), ("action", "/session"), ("method", "post")],
    );
    let label = doc.append_element(form, "label", &[("for", "username")]);
    doc.append_text(label, "Email address:");
    let username = doc.append_element(
        form,
        "input",
        &[("type", "email"), ("id", "username"), ("name", "username"), ("autocomplete", "username")],
    );
    doc.set_rect(username, Rect::new(20.0, 40.0, 240.0, 24.0));

    let password = doc.append_element(
        form,
        "input",
        &[("type", "password"), ("id", "password"), ("name", "password"), ("placeholder", "Password")],
    );
    doc.set_rect(password, Rect::new(20.0, 80.0, 240.0, 24.0));

    let remember = doc.append_element(form, "input", &[("type", "checkbox"), ("name", "remember")]);
    doc.set_rect(remember, Rect::new(20.0, 120.0, 16.0, 16.0));
    doc.append_text(form, "Remember me");

    let csrf = doc.append_element(form, "input", &[("type", "hidden"), ("name", "csrf"), ("value", "t0k3n")]);
    let submit = doc.append_element(form, "button", &[("type", "submit")]);
    doc.append_text(submit, "Sign in");
    doc.set_rect(submit, Rect::new(20.0, 150.0, 80.0, 30.0));

    LoginPage {
        doc,
        form,
        username,
        password,
        remember,
        csrf,
        submit,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
