//! End-to-end behavior of the markup modifier.

#[cfg(test)]
mod tests {
    use crate::markup::MarkupModifier;
    use crate::model::{Modification, ModificationResult, Operation, Position, Target};
    use crate::modifier::GrammarModifier;
    use crate::options::MarkupOptions;

    fn run_with(options: &MarkupOptions, source: &str, modifications: &[Modification]) -> ModificationResult {
        let refs: Vec<&Modification> = modifications.iter().collect();
        MarkupModifier::new(options).apply("index.html", source, &refs)
    }

    fn run(source: &str, modifications: &[Modification]) -> ModificationResult {
        run_with(&MarkupOptions::default(), source, modifications)
    }

    fn content(result: &ModificationResult) -> &str {
        assert!(result.success, "unexpected failure: {:?}", result.error);
        result.modified_content.as_deref().unwrap()
    }

    fn insert(selector: &str, value: &str) -> Modification {
        Modification::new("index.html", Operation::Insert, Target::selector(selector)).with_value(value)
    }

    #[test]
    fn test_insert_inside() {
        let m = insert("#x", "<span>hi</span>").with_position(Position::Inside);
        let result = run(r#"<div id="x"></div>"#, &[m]);
        assert_eq!(content(&result), r#"<div id="x"><span>hi</span></div>"#);
        assert_eq!(result.modifications_applied, 1);
    }

    #[test]
    fn test_insert_defaults_to_inside() {
        let m = insert("ul", "<li>c</li>");
        let result = run("<ul><li>a</li><li>b</li></ul>", &[m]);
        assert_eq!(content(&result), "<ul><li>a</li><li>b</li><li>c</li></ul>");
    }

    #[test]
    fn test_insert_prepend() {
        let m = insert("ul", "<li>first</li>").with_position(Position::Prepend);
        let result = run("<ul><li>a</li></ul>", &[m]);
        assert_eq!(content(&result), "<ul><li>first</li><li>a</li></ul>");
    }

    #[test]
    fn test_insert_before_and_after() {
        let before = insert("#b", "<hr>").with_position(Position::Before);
        let after = insert("#b", "<p>after</p>").with_position(Position::After);
        let result = run(r#"<main><p id="a"></p><p id="b"></p></main>"#, &[before, after]);
        assert_eq!(
            content(&result),
            r#"<main><p id="a"></p><hr><p id="b"></p><p>after</p></main>"#
        );
        assert_eq!(result.modifications_applied, 2);
    }

    #[test]
    fn test_insert_copies_fragment_per_match() {
        let m = insert(".item", "<i>!</i>");
        let result = run(r#"<b class="item"></b><b class="item"></b>"#, &[m]);
        assert_eq!(
            content(&result),
            r#"<b class="item"><i>!</i></b><b class="item"><i>!</i></b>"#
        );
        assert_eq!(result.modifications_applied, 2);
    }

    #[test]
    fn test_insert_is_not_idempotent() {
        let m = insert("#x", "<span>hi</span>");
        let once = content(&run(r#"<div id="x"></div>"#, &[m.clone()])).to_string();
        let twice = content(&run(&once, &[m])).to_string();
        assert_eq!(
            twice,
            r#"<div id="x"><span>hi</span><span>hi</span></div>"#
        );
    }

    #[test]
    fn test_update_text_is_destructive() {
        let m = Modification::new("index.html", Operation::Update, Target::selector("#card"))
            .with_value("plain");
        let result = run(
            r#"<section id="card"><h2>Title</h2><p>Body <em>text</em></p></section>"#,
            &[m],
        );
        assert_eq!(content(&result), r#"<section id="card">plain</section>"#);
    }

    #[test]
    fn test_update_text_is_escaped() {
        let m = Modification::new("index.html", Operation::Update, Target::selector("p"))
            .with_value("<b>not markup</b>");
        let result = run("<p>old</p>", &[m]);
        assert_eq!(content(&result), "<p>&lt;b&gt;not markup&lt;/b&gt;</p>");
    }

    #[test]
    fn test_update_attribute_upserts() {
        let m = Modification::new(
            "index.html",
            Operation::Update,
            Target::selector("a").with_attribute("href"),
        )
        .with_value("/docs");
        let result = run(r#"<a href="/old">x</a><a>y</a>"#, &[m]);
        assert_eq!(content(&result), r#"<a href="/docs">x</a><a href="/docs">y</a>"#);
        assert_eq!(result.modifications_applied, 2);
    }

    #[test]
    fn test_update_is_idempotent() {
        let m = Modification::new(
            "index.html",
            Operation::Update,
            Target::selector(".btn").with_attribute("disabled"),
        )
        .with_value(true);
        let once = content(&run(r#"<button class="btn">Go</button>"#, &[m.clone()])).to_string();
        let twice = content(&run(&once, &[m])).to_string();
        assert_eq!(once, twice);
        assert_eq!(once, r#"<button class="btn" disabled="true">Go</button>"#);
    }

    #[test]
    fn test_delete_element_and_attribute() {
        let drop_el = Modification::new("index.html", Operation::Delete, Target::selector(".ad"));
        let drop_attr = Modification::new(
            "index.html",
            Operation::Delete,
            Target::selector("img").with_attribute("width"),
        );
        let result = run(
            r#"<div><aside class="ad">buy</aside><img src="a.png" width="10"></div>"#,
            &[drop_el, drop_attr],
        );
        assert_eq!(content(&result), r#"<div><img src="a.png"></div>"#);
    }

    #[test]
    fn test_delete_missing_attribute_is_zero_match() {
        let m = Modification::new(
            "index.html",
            Operation::Delete,
            Target::selector("img").with_attribute("width"),
        );
        let result = run(r#"<img src="a.png">"#, &[m]);
        assert!(!result.success);
    }

    #[test]
    fn test_replace_element() {
        let m = Modification::new("index.html", Operation::Replace, Target::selector("#old"))
            .with_value("<p>new</p><p>more</p>");
        let result = run(r#"<div><span id="old">x</span></div>"#, &[m]);
        assert_eq!(content(&result), "<div><p>new</p><p>more</p></div>");
    }

    #[test]
    fn test_zero_match_fails() {
        let m = Modification::new("index.html", Operation::Delete, Target::selector("#nope"));
        let result = run("<div></div>", &[m]);
        assert!(!result.success);
        assert_eq!(result.modifications_applied, 0);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_tag_match_is_case_insensitive() {
        let m = Modification::new("index.html", Operation::Delete, Target::selector("SPAN"));
        let result = run("<p><span>x</span>y</p>", &[m]);
        assert_eq!(content(&result), "<p>y</p>");
    }

    #[test]
    fn test_full_document_round_trip() {
        let m = Modification::new(
            "index.html",
            Operation::Update,
            Target::selector("html").with_attribute("lang"),
        )
        .with_value("en");
        let result = run(
            "<!DOCTYPE html><html><head><title>T</title></head><body><p>x</p></body></html>",
            &[m],
        );
        assert_eq!(
            content(&result),
            r#"<!DOCTYPE html><html lang="en"><head><title>T</title></head><body><p>x</p></body></html>"#
        );
    }

    #[test]
    fn test_document_as_fragment_when_not_preserved() {
        let options = MarkupOptions {
            preserve_document: false,
        };
        let m = Modification::new("index.html", Operation::Delete, Target::selector("b"));
        let result = run_with(&options, "<html><body><p>a<b>b</b></p></body></html>", &[m]);
        assert_eq!(content(&result), "<p>a</p>");
    }

    #[test]
    fn test_untouched_nested_content_survives() {
        let m = Modification::new("index.html", Operation::Update, Target::selector("p"))
            .with_value("y");
        let result = run(
            r#"<main><nav><a href="/">Home</a></nav><section><p>x</p></section></main>"#,
            &[m],
        );
        assert_eq!(
            content(&result),
            r#"<main><nav><a href="/">Home</a></nav><section><p>y</p></section></main>"#
        );
    }

    #[test]
    fn test_head_and_body_without_html_are_kept() {
        let m = Modification::new("index.html", Operation::Update, Target::selector("p"))
            .with_value("y");
        let result = run("<head><title>T</title></head><body><p>x</p></body>", &[m]);
        let out = content(&result);
        assert!(out.contains("<head><title>T</title></head>"), "{}", out);
        assert!(out.contains("<body><p>y</p></body>"), "{}", out);
    }

    #[test]
    fn test_nested_matches_count_once() {
        let delete = Modification::new("index.html", Operation::Delete, Target::selector("div"));
        let result = run("<div><div>x</div></div><p></p>", &[delete]);
        assert_eq!(content(&result), "<p></p>");
        assert_eq!(result.modifications_applied, 1);

        let update = Modification::new("index.html", Operation::Update, Target::selector("div"))
            .with_value("y");
        let result = run("<div><div>x</div></div>", &[update]);
        assert_eq!(content(&result), "<div>y</div>");
        assert_eq!(result.modifications_applied, 1);
    }

    #[test]
    fn test_missing_selector_is_invalid() {
        let m = Modification::new("index.html", Operation::Delete, Target::default());
        let result = run("<p></p>", &[m]);
        assert!(result.error.unwrap().starts_with("Invalid modification"));
    }
}
