//! Tests for weft-model wire formats and settings loading.

use std::io::Write;

use proptest::prelude::*;
use weft_model::{
    ApplicationSettings, ComponentPath, FeedbackMessages, ModelError, PageId, PageMapName,
    PagePath, Parameters, RenderStrategy,
};

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_-]{0,8}"
}

proptest! {
    #[test]
    fn page_path_round_trips(
        map in prop_oneof![Just("default".to_string()), segment()],
        id in 0u32..100_000,
        segments in proptest::collection::vec(segment(), 0..5),
    ) {
        let mut path = PagePath::new(PageMapName::new(map).unwrap(), PageId(id));
        if !segments.is_empty() {
            path = path.with_component(ComponentPath::from_segments(segments).unwrap());
        }
        let parsed: PagePath = path.to_string().parse().unwrap();
        prop_assert_eq!(parsed, path);
    }

    #[test]
    fn query_round_trips(
        pairs in proptest::collection::vec(("[a-z]{1,6}", "\\PC{0,12}"), 0..6),
    ) {
        let params: Parameters = pairs.iter().cloned().collect();
        let decoded = Parameters::from_query(&params.to_query());
        prop_assert_eq!(decoded, params);
    }
}

#[test]
fn bookmarkable_query_snapshot() {
    let params: Parameters = [
        ("bookmarkablePage", "Welcome"),
        ("name", "Ada Lovelace"),
        ("page", "popup:2"),
    ]
    .into_iter()
    .collect();
    insta::assert_snapshot!(
        params.to_query(),
        @"bookmarkablePage=Welcome&name=Ada%20Lovelace&page=popup:2"
    );
}

#[test]
fn settings_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
home_page = "Landing"
page_expired_page = "Expired"
render_strategy = "redirect_to_render"
max_pages_per_map = 3
"#
    )
    .expect("write settings");

    let settings = ApplicationSettings::load(file.path()).expect("load settings");
    assert_eq!(settings.home_page, "Landing");
    assert_eq!(settings.page_expired_page.as_deref(), Some("Expired"));
    assert_eq!(settings.render_strategy, RenderStrategy::RedirectToRender);
    assert_eq!(settings.max_pages_per_map, 3);
    assert_eq!(settings.buffer_capacity_per_session, 4);
}

#[test]
fn missing_settings_file_reports_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("nope.toml");
    let err = ApplicationSettings::load(&missing).unwrap_err();
    assert!(matches!(err, ModelError::SettingsIo { ref path, .. } if path == &missing));
}

#[test]
fn feedback_serializes_with_levels() {
    let mut feedback = FeedbackMessages::default();
    feedback.info(None, "saved");
    let json = serde_json::to_value(&feedback).expect("serialize feedback");
    assert_eq!(json["messages"][0]["level"], "info");
    assert_eq!(json["messages"][0]["message"], "saved");
}
