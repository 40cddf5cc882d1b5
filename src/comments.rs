//! The third-party comment widget embedded at the bottom of post pages.

use pulldown_cmark::escape::{escape_href, escape_html};
use serde::Deserialize;

/// The id of the element the widget attaches to.
pub const ANCHOR_ID: &str = "inject-comments-for-uterances";

/// Configuration for an [utterances](https://utteranc.es) widget, which keeps
/// each page's comments in a GitHub issue.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CommentWidget {
    /// The GitHub repository (`owner/name`) holding the comment issues.
    pub repo: String,

    /// How a page maps onto an issue.
    #[serde(default = "default_issue_term")]
    pub issue_term: String,

    #[serde(default = "default_theme")]
    pub theme: String,

    /// A label applied to issues the widget creates.
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default = "default_script_url")]
    pub script_url: String,
}

fn default_issue_term() -> String {
    String::from("pathname")
}

fn default_theme() -> String {
    String::from("github-dark")
}

fn default_script_url() -> String {
    String::from("https://utteranc.es/client.js")
}

impl CommentWidget {
    pub fn new(repo: &str) -> CommentWidget {
        CommentWidget {
            repo: repo.to_owned(),
            issue_term: default_issue_term(),
            theme: default_theme(),
            label: None,
            script_url: default_script_url(),
        }
    }

    /// Renders the widget's container with its loader script nested inside,
    /// so the script lives exactly as long as the container does.
    pub fn to_html(&self) -> String {
        let mut out = format!("<div id=\"{}\"><script src=\"", ANCHOR_ID);
        let _ = escape_href(&mut out, &self.script_url);
        out.push('"');
        attribute(&mut out, "repo", &self.repo);
        attribute(&mut out, "issue-term", &self.issue_term);
        attribute(&mut out, "theme", &self.theme);
        if let Some(label) = &self.label {
            attribute(&mut out, "label", label);
        }
        out.push_str(" crossorigin=\"anonymous\" async></script></div>");
        out
    }
}

fn attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    let _ = escape_html(&mut *out, value);
    out.push('"');
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() -> serde_yaml::Result<()> {
        let widget: CommentWidget = serde_yaml::from_str("repo: brunomacedo1/utterancebot")?;
        assert_eq!(CommentWidget::new("brunomacedo1/utterancebot"), widget);
        Ok(())
    }

    #[test]
    fn test_to_html() {
        assert_eq!(
            "<div id=\"inject-comments-for-uterances\">\
             <script src=\"https://utteranc.es/client.js\" repo=\"owner/blog\" \
             issue-term=\"pathname\" theme=\"github-dark\" \
             crossorigin=\"anonymous\" async></script></div>",
            CommentWidget::new("owner/blog").to_html()
        );
    }

    #[test]
    fn test_attributes_are_escaped() {
        let widget = CommentWidget {
            label: Some(String::from("\"><script>")),
            ..CommentWidget::new("owner/blog")
        };
        assert!(widget
            .to_html()
            .contains(" label=\"&quot;&gt;&lt;script&gt;\" "));
    }
}
