//! Server-rendered pages.

use std::fmt::Write as _;

use crate::forecast::WeatherForecast;

pub const APP_TITLE: &str = "family-copilot";

/// Escape text for HTML element and attribute content.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\" />\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\" />\n\
         <title>{title}</title>\n</head>\n<body>\n\
         <nav><a href=\"/\">Home</a> | <a href=\"/weather\">Weather</a></nav>\n\
         <main>\n{body}\n</main>\n</body>\n</html>\n",
        title = escape_html(title),
    )
}

pub fn home_page() -> String {
    layout(
        "Home",
        "<h1>Hello, world!</h1>\n<p>Welcome to your new app.</p>",
    )
}

pub fn weather_page(forecasts: &[WeatherForecast]) -> String {
    let mut body = String::from(
        "<h1>Weather</h1>\n<p>This component demonstrates showing data loaded from a backend API service.</p>\n",
    );

    if forecasts.is_empty() {
        body.push_str("<p><em>No forecasts available.</em></p>");
        return layout("Weather", &body);
    }

    body.push_str(
        "<table class=\"table\">\n<thead>\n<tr><th>Date</th><th aria-label=\"Temperature in Celsius\">Temp. (C)</th>\
         <th aria-label=\"Temperature in Fahrenheit\">Temp. (F)</th><th>Summary</th></tr>\n</thead>\n<tbody>\n",
    );
    for forecast in forecasts {
        let _ = writeln!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            forecast.date.format("%-m/%-d/%Y"),
            forecast.temperature_c,
            forecast.temperature_f(),
            escape_html(forecast.summary.as_deref().unwrap_or("")),
        );
    }
    body.push_str("</tbody>\n</table>");
    layout("Weather", &body)
}

/// Error page. `detail` is only shown in Development.
pub fn error_page(request_id: Option<&str>, detail: Option<&str>) -> String {
    let mut body = String::from(
        "<h1 class=\"text-danger\">Error.</h1>\n<h2 class=\"text-danger\">An error occurred while processing your request.</h2>\n",
    );
    if let Some(id) = request_id {
        let _ = writeln!(body, "<p><strong>Request ID:</strong> <code>{}</code></p>", escape_html(id));
    }
    if let Some(detail) = detail {
        let _ = writeln!(body, "<h3>Development Mode</h3>\n<pre>{}</pre>", escape_html(detail));
    }
    layout("Error", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape_html(r#"<b a="1">&'</b>"#),
            "&lt;b a=&quot;1&quot;&gt;&amp;&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_weather_table() {
        let forecasts = vec![WeatherForecast::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            20,
            Some("<Mild>".to_string()),
        )];
        let html = weather_page(&forecasts);
        assert!(html.contains("<td>3/1/2024</td><td>20</td><td>67</td><td>&lt;Mild&gt;</td>"));
    }

    #[test]
    fn test_error_page_hides_detail_unless_given() {
        let html = error_page(Some("abc"), None);
        assert!(html.contains("abc"));
        assert!(!html.contains("Development Mode"));
    }
}
