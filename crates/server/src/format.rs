//! Response encodings of a [`GeoRecord`].

use std::{fmt, sync::LazyLock};

use axum::response::{IntoResponse, Response};
use geoip::GeoRecord;
use http::header::CONTENT_TYPE;
use regex::Regex;
use serde::Serialize;

use crate::error::ApiError;

const XML_PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// A JavaScript identifier path such as `handle` or `app.geo.done`.
static CALLBACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$.]*$").expect("callback pattern is a valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Csv,
    Json,
    Xml,
}

impl Format {
    pub(crate) const ALL: [Format; 3] = [Format::Csv, Format::Json, Format::Xml];

    fn name(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Xml => "xml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An encoded record, ready to be sent.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Rendered {
    pub(crate) content_type: &'static str,
    pub(crate) body: String,
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        ([(CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

/// Encodes `record`. A callback wraps JSON output as JSONP and is ignored by the other formats.
pub(crate) fn render(format: Format, record: &GeoRecord, callback: Option<&str>) -> Result<Rendered, ApiError> {
    match format {
        Format::Csv => csv(record),
        Format::Json => json(record, callback),
        Format::Xml => xml(record),
    }
}

fn csv(record: &GeoRecord) -> Result<Rendered, ApiError> {
    let location = &record.location;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer
        .write_record([
            record.ip.as_str(),
            location.country_code.as_str(),
            location.country_name.as_str(),
            location.region_code.as_str(),
            location.region_name.as_str(),
            location.city_name.as_str(),
            location.postal_code.as_str(),
            format!("{:.4}", location.latitude).as_str(),
            format!("{:.4}", location.longitude).as_str(),
            location.metro_code.as_str(),
            location.area_code.as_str(),
        ])
        .map_err(|e| ApiError::Render(e.to_string()))?;

    let bytes = writer.into_inner().map_err(|e| ApiError::Render(e.to_string()))?;
    let body = String::from_utf8(bytes).map_err(|e| ApiError::Render(e.to_string()))?;

    Ok(Rendered {
        content_type: "application/csv",
        body,
    })
}

fn json(record: &GeoRecord, callback: Option<&str>) -> Result<Rendered, ApiError> {
    let encoded = serde_json::to_string(record).map_err(|e| ApiError::Render(e.to_string()))?;

    let rendered = match callback.filter(|callback| !callback.is_empty()) {
        None => Rendered {
            content_type: "application/json",
            body: format!("{encoded}\r\n"),
        },
        Some(callback) if is_valid_callback(callback) => Rendered {
            content_type: "text/javascript",
            body: format!("{callback}({encoded});\r\n"),
        },
        Some(callback) => return Err(ApiError::InvalidCallback(callback.to_string())),
    };

    Ok(rendered)
}

fn is_valid_callback(callback: &str) -> bool {
    CALLBACK.is_match(callback)
}

#[derive(Serialize)]
#[serde(rename = "Response", rename_all = "PascalCase")]
struct XmlRecord<'a> {
    ip: &'a str,
    country_code: &'a str,
    country_name: &'a str,
    region_code: &'a str,
    region_name: &'a str,
    city: &'a str,
    zip_code: &'a str,
    latitude: f32,
    longitude: f32,
    metro_code: &'a str,
    area_code: &'a str,
}

fn xml(record: &GeoRecord) -> Result<Rendered, ApiError> {
    let location = &record.location;

    let view = XmlRecord {
        ip: &record.ip,
        country_code: &location.country_code,
        country_name: &location.country_name,
        region_code: &location.region_code,
        region_name: &location.region_name,
        city: &location.city_name,
        zip_code: &location.postal_code,
        latitude: location.latitude,
        longitude: location.longitude,
        metro_code: &location.metro_code,
        area_code: &location.area_code,
    };

    let encoded = quick_xml::se::to_string(&view).map_err(|e| ApiError::Render(e.to_string()))?;

    Ok(Rendered {
        content_type: "application/xml",
        body: format!("{XML_PROLOG}\n{encoded}\r\n"),
    })
}

#[cfg(test)]
mod tests {
    use geoip::Location;
    use insta::assert_snapshot;

    use super::*;

    fn mountain_view() -> GeoRecord {
        GeoRecord::new(
            "8.8.8.8",
            Location {
                country_code: "US".into(),
                country_name: "United States".into(),
                region_code: "CA".into(),
                region_name: "California".into(),
                city_name: "Mountain View".into(),
                postal_code: "94043".into(),
                latitude: 37.386,
                longitude: -122.0838,
                metro_code: "807".into(),
                area_code: "650".into(),
            },
        )
    }

    #[test]
    fn csv_quotes_every_field() {
        let rendered = render(Format::Csv, &mountain_view(), None).unwrap();

        assert_eq!(rendered.content_type, "application/csv");
        assert_eq!(
            rendered.body,
            "\"8.8.8.8\",\"US\",\"United States\",\"CA\",\"California\",\"Mountain View\",\"94043\",\"37.3860\",\"-122.0838\",\"807\",\"650\"\r\n"
        );
    }

    #[test]
    fn csv_of_a_reserved_record() {
        let record = GeoRecord::new("10.0.0.1", Location::reserved());
        let rendered = render(Format::Csv, &record, None).unwrap();

        assert_eq!(
            rendered.body,
            "\"10.0.0.1\",\"RD\",\"Reserved\",\"\",\"\",\"\",\"\",\"0.0000\",\"0.0000\",\"\",\"\"\r\n"
        );
    }

    #[test]
    fn json_body() {
        let rendered = render(Format::Json, &mountain_view(), None).unwrap();

        assert_eq!(rendered.content_type, "application/json");
        assert_snapshot!(
            rendered.body.trim_end(),
            @r#"{"ip":"8.8.8.8","country_code":"US","country_name":"United States","region_code":"CA","region_name":"California","city":"Mountain View","zipcode":"94043","latitude":37.386,"longitude":-122.0838,"metro_code":"807","areacode":"650"}"#
        );
        assert!(rendered.body.ends_with("}\r\n"));
    }

    #[test]
    fn jsonp_wraps_the_body() {
        let rendered = render(Format::Json, &mountain_view(), Some("app.geo.done")).unwrap();

        assert_eq!(rendered.content_type, "text/javascript");
        assert!(rendered.body.starts_with(r#"app.geo.done({"ip":"8.8.8.8","#));
        assert!(rendered.body.ends_with("});\r\n"));
    }

    #[test]
    fn empty_callback_is_plain_json() {
        let rendered = render(Format::Json, &mountain_view(), Some("")).unwrap();
        assert_eq!(rendered.content_type, "application/json");
    }

    #[test]
    fn callbacks_must_be_identifiers() {
        for callback in ["alert(1)", "1abc", "a b", "x;y", "</script>", "cb\n", "é", ".a"] {
            assert!(
                matches!(
                    render(Format::Json, &mountain_view(), Some(callback)),
                    Err(ApiError::InvalidCallback(_))
                ),
                "{callback} should be rejected"
            );
        }

        for callback in ["cb", "_cb", "$", "jQuery123_456", "a.b.c"] {
            assert!(is_valid_callback(callback), "{callback} should be accepted");
        }
    }

    #[test]
    fn xml_document() {
        let rendered = render(Format::Xml, &mountain_view(), Some("ignored")).unwrap();

        assert_eq!(rendered.content_type, "application/xml");
        assert_snapshot!(rendered.body.trim_end(), @r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <Response><Ip>8.8.8.8</Ip><CountryCode>US</CountryCode><CountryName>United States</CountryName><RegionCode>CA</RegionCode><RegionName>California</RegionName><City>Mountain View</City><ZipCode>94043</ZipCode><Latitude>37.386</Latitude><Longitude>-122.0838</Longitude><MetroCode>807</MetroCode><AreaCode>650</AreaCode></Response>
        "#);
    }

    #[test]
    fn xml_escapes_text() {
        let mut record = mountain_view();
        record.location.city_name = "A & B <C".into();

        let rendered = render(Format::Xml, &record, None).unwrap();

        assert!(rendered.body.contains("<City>A &amp; B &lt;C</City>"), "{}", rendered.body);
    }
}
