//! Mock EDD server helpers shared by the integration tests

#![allow(dead_code)]

use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOGIN_PAGE: &str = "/accounts/login/";
pub const USERNAME: &str = "jdoe";
pub const PASSWORD: &str = "s3cret";
pub const CSRF_TOKEN: &str = "tok123";

pub fn password() -> SecretString {
    SecretString::from(PASSWORD.to_string())
}

/// Mount the CSRF page and a credential POST that accepts or rejects
pub async fn mount_login(server: &MockServer, accept: bool) {
    Mock::given(method("GET"))
        .and(path(LOGIN_PAGE))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", format!("csrftoken={}; Path=/", CSRF_TOKEN).as_str())
                .set_body_string("<form method=\"post\"></form>"),
        )
        .mount(server)
        .await;

    let referer = format!("{}{}", server.uri(), LOGIN_PAGE);
    let body = if accept {
        "<h1>Welcome to EDD</h1>"
    } else {
        "<div class=\"alert\">Login failed. Check your credentials.</div>"
    };

    Mock::given(method("POST"))
        .and(path(LOGIN_PAGE))
        .and(header("referer", referer.as_str()))
        .and(body_string_contains(format!("csrfmiddlewaretoken={}", CSRF_TOKEN)))
        .and(body_string_contains(format!("login={}", USERNAME)))
        .and(body_string_contains(format!("password={}", PASSWORD)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "sessionid=sess42; Path=/")
                .set_body_string(body),
        )
        .expect(1)
        .mount(server)
        .await;
}

/// Mount the study lookup with the given JSON results
pub async fn mount_lookup(server: &MockServer, slug: &str, results: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/studies/"))
        .and(query_param("slug", slug))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": results })),
        )
        .mount(server)
        .await;
}

/// Mount the count and stream endpoints of a study, each expected `calls` times
pub async fn mount_export(
    server: &MockServer,
    study_id: u64,
    total_count: Option<&str>,
    body: &str,
    calls: u64,
) {
    let mut count_response = ResponseTemplate::new(200).set_body_string("ignored");
    if let Some(total) = total_count {
        count_response = count_response.insert_header("X-Total-Count", total);
    }

    Mock::given(method("GET"))
        .and(path("/rest/export/"))
        .and(query_param("study_id", study_id.to_string()))
        .respond_with(count_response)
        .expect(calls)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/stream-export/"))
        .and(query_param("study_id", study_id.to_string()))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.to_owned(), "text/csv; charset=utf-8"),
        )
        .expect(calls)
        .mount(server)
        .await;
}
