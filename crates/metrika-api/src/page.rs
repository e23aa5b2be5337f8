//! GET / — an HTML table of every stored metric.

use std::fmt::Write;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};

use crate::ApiState;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub async fn index(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = match state.store.snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let mut rows = String::new();
    for metric in snapshot.iter() {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&metric.id),
            metric.kind(),
            metric.value
        );
    }

    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>Metrics</title></head><body>\
         <table><thead><tr><th>Name</th><th>Type</th><th>Value</th></tr></thead>\
         <tbody>{rows}</tbody></table></body></html>"
    ))
    .into_response()
}
