use super::*;

#[test]
fn parses_header_comments_and_nested_values() {
    let text = r#"// !$*UTF8*$!
{
	archiveVersion = 1;
	/* inline comment */
	classes = {
	};
	list = (
		A1 /* first */,
		"with space",
	);
}
"#;
    let v = parse(text).expect("parse");
    let root = v.as_dict().expect("dict");
    assert_eq!(root["archiveVersion"].as_str(), Some("1"));
    assert_eq!(root["classes"].as_dict().map(|d| d.len()), Some(0));
    let list = root["list"].as_array().expect("array");
    assert_eq!(list.len(), 2);
    assert_eq!(list[1].as_str(), Some("with space"));
}

#[test]
fn array_without_trailing_comma_is_accepted() {
    let v = parse("(a, b)").expect("parse");
    assert_eq!(v.strings(), vec!["a", "b"]);
}

#[test]
fn quoted_escapes_are_decoded() {
    let v = parse(r#"{ k = "a\"b\\c\nd\U00e9"; }"#).expect("parse");
    assert_eq!(v.as_dict().unwrap()["k"].as_str(), Some("a\"b\\c\nd\u{e9}"));
}

#[test]
fn unquoted_strings_keep_group_markers_and_dashes() {
    let v = parse("{ sourceTree = <group>; id = com.example.app-ios; }").expect("parse");
    let d = v.as_dict().unwrap();
    assert_eq!(d["sourceTree"].as_str(), Some("<group>"));
    assert_eq!(d["id"].as_str(), Some("com.example.app-ios"));
}

#[test]
fn errors_report_line_and_column() {
    let err = parse("{\n  a = b\n}").expect_err("missing semicolon");
    assert_eq!(err.line, 3);
    assert_eq!(err.column, 1);
    assert!(err.message.contains("expected `;`"), "{err}");
}

#[test]
fn unterminated_comment_points_at_its_start() {
    let err = parse("{ /* never closed").expect_err("unterminated");
    assert_eq!((err.line, err.column), (1, 3));
}

#[test]
fn trailing_garbage_is_rejected() {
    assert!(parse("{ } extra").is_err());
}

#[test]
fn quoting_matches_xcode_rules() {
    assert_eq!(quote_if_needed("Foo.swift"), "Foo.swift");
    assert_eq!(quote_if_needed("$(SRCROOT)/x"), "\"$(SRCROOT)/x\"");
    assert_eq!(quote_if_needed("<group>"), "\"<group>\"");
    assert_eq!(quote_if_needed("on brand"), "\"on brand\"");
    assert_eq!(quote_if_needed(""), "\"\"");
    assert_eq!(quote_if_needed("a-b"), "\"a-b\"");
    assert_eq!(quote_if_needed("say \"hi\""), "\"say \\\"hi\\\"\"");
}
