use crate::html::{absolute_url, element_text, selector};
use crate::media::{Comment, ItemType, MembershipTier};
use crate::urls::PROFILE_LINK_RE;
use scraper::{ElementRef, Html};
use url::Url;

const COMMENTS_ENDPOINT: &str = "templates/hypnotube/template.ajax_comments.php";

pub fn comments_url(base: &Url, item_id: &str, item_type: ItemType) -> Option<String> {
    let mut url = base.join(COMMENTS_ENDPOINT).ok()?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("id", item_id);
        if item_type == ItemType::Gallery {
            query.append_pair("type", "gallery");
        }
    }
    Some(url.to_string())
}

/// Comments in feed order. Missing pieces of a block become `None`; a block is
/// never dropped and parsing never fails.
pub fn parse_comments(html: &str, feed_url: &str) -> Vec<Comment> {
    let Ok(base) = Url::parse(feed_url) else {
        return Vec::new();
    };
    let document = Html::parse_fragment(html);
    let block_sel = selector("div.block");
    document
        .select(&block_sel)
        .map(|block| parse_block(&block, &base))
        .collect()
}

fn parse_block(block: &ElementRef<'_>, base: &Url) -> Comment {
    let anchor_sel = selector("a");
    let strong_sel = selector("strong");
    let body_sel = selector("p");

    let author_anchor = block.select(&anchor_sel).next();
    let author_name = block
        .select(&strong_sel)
        .next()
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .or_else(|| {
            author_anchor
                .map(|a| element_text(&a))
                .filter(|t| !t.is_empty())
        });
    let body = block
        .select(&body_sel)
        .next()
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty());

    let avatar_anchor = preceding_avatar_anchor(block);
    let img_sel = selector("img[src]");
    let author_avatar_url = avatar_anchor
        .and_then(|a| a.select(&img_sel).next())
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| absolute_url(src, base));
    let author_profile_url = avatar_anchor
        .into_iter()
        .chain(author_anchor)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| absolute_url(href, base))
        .find(|url| PROFILE_LINK_RE.is_match(url));
    let author_id = author_profile_url
        .as_deref()
        .and_then(|url| PROFILE_LINK_RE.captures(url))
        .map(|caps| caps["id"].to_string());

    Comment {
        author_name,
        author_id,
        author_avatar_url,
        author_profile_url,
        author_membership_tier: author_anchor
            .map(|a| membership_tier(&a))
            .unwrap_or(MembershipTier::None),
        relative_time_text: author_anchor.and_then(|a| following_text(&a)),
        body,
    }
}

/// The avatar link sits right before the block as its previous element sibling.
fn preceding_avatar_anchor<'a>(block: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    block
        .prev_siblings()
        .find_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
}

fn membership_tier(anchor: &ElementRef<'_>) -> MembershipTier {
    let mut tier = MembershipTier::None;
    for class in anchor.value().classes() {
        match class {
            "name_premium" => return MembershipTier::Premium,
            "name_normal" => tier = MembershipTier::Normal,
            _ => {}
        }
    }
    tier
}

fn following_text(anchor: &ElementRef<'_>) -> Option<String> {
    anchor.next_siblings().find_map(|node| {
        let text = node.value().as_text()?;
        let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED_URL: &str =
        "https://hypnotube.com/templates/hypnotube/template.ajax_comments.php?id=40110";

    #[test]
    fn builds_comment_feed_urls() {
        let base = Url::parse("https://hypnotube.com/").expect("base");
        assert_eq!(comments_url(&base, "40110", ItemType::Video).as_deref(), Some(FEED_URL));
        assert_eq!(
            comments_url(&base, "812", ItemType::Gallery).as_deref(),
            Some("https://hypnotube.com/templates/hypnotube/template.ajax_comments.php?id=812&type=gallery")
        );
    }

    #[test]
    fn premium_comment_block() {
        let html = r#"
        <div class="comment">
          <a href="/user/alice-77/"><img src="/avatars/77.jpg"></a>
          <div class="block">
            <a class="name_premium" href="/user/alice-77/"><strong>Alice</strong></a> 3 days ago
            <p>Great clip</p>
          </div>
        </div>
        "#;
        let comments = parse_comments(html, FEED_URL);
        assert_eq!(
            comments,
            vec![Comment {
                author_name: Some("Alice".to_string()),
                author_id: Some("77".to_string()),
                author_avatar_url: Some("https://hypnotube.com/avatars/77.jpg".to_string()),
                author_profile_url: Some("https://hypnotube.com/user/alice-77/".to_string()),
                author_membership_tier: MembershipTier::Premium,
                relative_time_text: Some("3 days ago".to_string()),
                body: Some("Great clip".to_string()),
            }]
        );
    }

    #[test]
    fn sparse_blocks_degrade_field_by_field() {
        let html = r#"
        <div class="block"><a class="name_normal"><strong>Bob</strong></a></div>
        <div class="block"><p>anonymous words</p></div>
        "#;
        let comments = parse_comments(html, FEED_URL);
        assert_eq!(comments.len(), 2);

        assert_eq!(comments[0].author_name.as_deref(), Some("Bob"));
        assert_eq!(comments[0].author_membership_tier, MembershipTier::Normal);
        assert!(comments[0].relative_time_text.is_none());
        assert!(comments[0].body.is_none());
        assert!(comments[0].author_id.is_none());
        assert!(comments[0].author_avatar_url.is_none());

        assert!(comments[1].author_name.is_none());
        assert_eq!(comments[1].author_membership_tier, MembershipTier::None);
        assert_eq!(comments[1].body.as_deref(), Some("anonymous words"));
    }

    #[test]
    fn keeps_feed_order() {
        let html = r#"
        <div class="block"><a><strong>first</strong></a><p>1</p></div>
        <div class="block"><a><strong>second</strong></a><p>2</p></div>
        <div class="block"><a><strong>third</strong></a><p>3</p></div>
        "#;
        let names: Vec<String> = parse_comments(html, FEED_URL)
            .into_iter()
            .filter_map(|c| c.author_name)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn empty_feed_has_no_comments() {
        assert!(parse_comments("", FEED_URL).is_empty());
        assert!(parse_comments("<p>No comments yet</p>", FEED_URL).is_empty());
    }
}
