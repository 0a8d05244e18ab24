use axum::{
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::Config;

/// HTTP 日期格式（Last-Modified / Expires / If-Modified-Since 共用）
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

pub fn http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

/// 解析 If-Modified-Since，丢弃 ';' 之后的附加字段
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.split(';').next().unwrap_or("").trim();
    NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// 转义插入 HTML 模板的文本
pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// 模板占位符替换，占位符写作 `{ name }`，替换值已转义
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{ {name} }}"), &html_escape(value));
    }
    out
}

/// 将 continue 参数收敛为同源相对路径，非法值一律回退 "/"
pub fn safe_continue(raw: Option<&str>) -> String {
    match raw {
        Some(value) if value.starts_with('/') && !value.starts_with("//") => value.to_string(),
        _ => "/".to_string(),
    }
}

/// 当前请求的站点根地址：优先取配置的外部地址，否则按 Host 头拼接
pub fn host_url(config: &Config, headers: &HeaderMap) -> String {
    if let Some(base) = &config.external_base_url {
        return base.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

/// 302 跳转（axum 的 Redirect::to 是 303）
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn http_date_round_trip() {
        let time = Utc.with_ymd_and_hms(2009, 3, 14, 8, 12, 31).unwrap();
        let formatted = http_date(time);
        assert_eq!(formatted, "Sat, 14 Mar 2009 08:12:31 GMT");
        assert_eq!(parse_http_date(&formatted), Some(time));
    }

    #[test]
    fn http_date_drops_trailing_qualifier() {
        let parsed = parse_http_date("Sat, 14 Mar 2009 08:12:31 GMT; length=1024");
        assert_eq!(
            parsed,
            Some(Utc.with_ymd_and_hms(2009, 3, 14, 8, 12, 31).unwrap())
        );
        assert_eq!(parse_http_date("not a date"), None);
    }

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(
            html_escape(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn render_replaces_and_escapes() {
        let page = render("<p>{ name }</p>", &[("name", "<b>")]);
        assert_eq!(page, "<p>&lt;b&gt;</p>");
    }

    #[test]
    fn continue_restricted_to_local_paths() {
        assert_eq!(safe_continue(Some("/next?a=1")), "/next?a=1");
        assert_eq!(safe_continue(Some("https://evil.example/")), "/");
        assert_eq!(safe_continue(Some("//evil.example/")), "/");
        assert_eq!(safe_continue(Some("")), "/");
        assert_eq!(safe_continue(None), "/");
    }

    #[test]
    fn host_url_prefers_configured_base() {
        let mut config = crate::config::tests::test_config();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "app.example.com".parse().unwrap());
        assert_eq!(host_url(&config, &headers), "http://app.example.com");

        config.external_base_url = Some("https://login.example.com/".into());
        assert_eq!(host_url(&config, &headers), "https://login.example.com");
    }
}
