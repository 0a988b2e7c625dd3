use super::{ObjectId, PbxProject};

pub(crate) const SAMPLE: &str = include_str!("../../tests/fixtures/App.xcodeproj/project.pbxproj");

pub(crate) const MAIN_GROUP: &str = "7BD000000000000000000000";
pub(crate) const APP_GROUP: &str = "7BD000000000000000000001";
pub(crate) const TESTS_GROUP: &str = "7BD000000000000000000002";
pub(crate) const APP_TARGET: &str = "7BE000000000000000000001";
pub(crate) const TESTS_TARGET: &str = "7BE000000000000000000002";
pub(crate) const APP_SOURCES: &str = "7B3000000000000000000001";
pub(crate) const APP_RESOURCES: &str = "7B2000000000000000000001";
pub(crate) const TESTS_SOURCES: &str = "7B3000000000000000000002";
pub(crate) const APP_SWIFT: &str = "7BF000000000000000000001";
pub(crate) const CONTENT_VIEW: &str = "7BF000000000000000000002";
pub(crate) const INFO_PLIST: &str = "7BF000000000000000000004";
pub(crate) const TESTS_SWIFT: &str = "7BF000000000000000000005";
pub(crate) const CONTENT_VIEW_BUILD: &str = "7BB000000000000000000002";

pub(crate) fn sample() -> PbxProject {
    PbxProject::parse(SAMPLE, "App").expect("fixture parses")
}

pub(crate) fn id(raw: &str) -> ObjectId {
    ObjectId::new(raw)
}
