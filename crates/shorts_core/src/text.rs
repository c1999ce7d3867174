use ego_tree::NodeRef;
use scraper::{ElementRef, Node};

/// Subtrees never treated as readable content.
pub(crate) const ALWAYS_SKIPPED: &[&str] = &["script", "style", "noscript", "template"];

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "cite", "code", "em", "i", "mark", "small", "span", "strong", "sub", "sup",
    "u",
];

/// Text of `element` with the named subtrees left out and whitespace collapsed.
pub(crate) fn visible_text(element: ElementRef<'_>, skip: &[&str]) -> String {
    let mut raw = String::new();
    collect_text(*element, skip, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(node: NodeRef<'_, Node>, skip: &[&str], out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if is_listed(name, ALWAYS_SKIPPED) || is_listed(name, skip) {
                    continue;
                }
                let block = !is_listed(name, INLINE_TAGS);
                if block {
                    out.push(' ');
                }
                collect_text(child, skip, out);
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn is_listed(name: &str, tags: &[&str]) -> bool {
    tags.iter().any(|tag| name.eq_ignore_ascii_case(tag))
}

pub(crate) fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn char_len(input: &str) -> usize {
    input.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn skips_listed_subtrees_and_separates_blocks() {
        let doc = Html::parse_document(
            "<body><nav>Menu</nav><h1>Head</h1><p>One <b>bold</b>\n word</p><script>x()</script></body>",
        );
        let body = doc
            .select(&Selector::parse("body").unwrap())
            .next()
            .unwrap();
        assert_eq!(visible_text(body, &["nav"]), "Head One bold word");
    }
}
