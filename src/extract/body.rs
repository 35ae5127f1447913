//! Body extraction: readability first, then a DOM container fallback.
//!
//! Bodies are always plain text. Markup never reaches the feed description.

use super::{Extracted, FallbackChain, Page, element_text, non_empty};
use crate::sanitize::sanitize;
use scraper::{ElementRef, Html};

pub fn chain() -> FallbackChain<String> {
    FallbackChain::new()
        .then("readability", from_readability)
        .then("container", from_container)
}

/// Run the body chain, falling back to a placeholder that links the article.
pub fn extract_body(page: &Page<'_>) -> Extracted<String> {
    match chain().run(page) {
        Some(hit) => Extracted::Found(hit),
        None => Extracted::Placeholder(placeholder(page)),
    }
}

fn placeholder(page: &Page<'_>) -> String {
    sanitize(&page.rules.body_placeholder.replace("{url}", page.url.as_str()))
}

pub(crate) fn from_readability(page: &Page<'_>) -> Option<String> {
    page.readability
        .extract(page.html, page.url)
        .map(|text| sanitize(&text))
        .and_then(non_empty)
}

/// First configured container, in selector order.
pub(crate) fn find_container<'a>(page: &Page<'_>, document: &'a Html) -> Option<ElementRef<'a>> {
    page.rules
        .body_containers
        .iter()
        .find_map(|selector| document.select(selector).next())
}

/// Text of the first container after removing noise elements.
///
/// Works on a clone of the document: noise subtrees are detached from the
/// copy, which is dropped when this call returns.
pub(crate) fn from_container(page: &Page<'_>) -> Option<String> {
    let mut document = page.document.clone();
    let container_id = find_container(page, &document)?.id();

    let noise: Vec<_> = {
        let container = ElementRef::wrap(document.tree.get(container_id)?)?;
        page.rules
            .noise
            .iter()
            .flat_map(|selector| container.select(selector).map(|el| el.id()))
            .filter(|id| *id != container_id)
            .collect()
    };
    for id in noise {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    let container = ElementRef::wrap(document.tree.get(container_id)?)?;
    non_empty(sanitize(&element_text(container)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::testing::Fixture;

    const ARTICLE: &str = r#"<html><body>
        <header>Menu principale</header>
        <article>
            <nav>Home &gt; Notizie</nav>
            <h1>Titolo</h1>
            <p>Primo paragrafo dell'articolo.</p>
            <script>var tracking = 1;</script>
            <aside class="sidebar">Articoli correlati</aside>
            <p>Secondo paragrafo.</p>
            <footer>Condividi</footer>
        </article>
        <footer>Copyright</footer>
    </body></html>"#;

    #[test]
    fn test_readability_output_wins_when_present() {
        let fixture = Fixture::new(ARTICLE).with_readability("  Testo   principale \n estratto ");
        let body = extract_body(&fixture.page());
        assert_eq!(body.value(), "Testo principale estratto");
        assert_eq!(body.strategy(), "readability");
    }

    #[test]
    fn test_blank_readability_output_falls_through() {
        let fixture = Fixture::new(ARTICLE).with_readability(" \n ");
        let body = extract_body(&fixture.page());
        assert_eq!(body.strategy(), "container");
    }

    #[test]
    fn test_container_fallback_removes_noise() {
        let fixture = Fixture::new(ARTICLE);
        let body = extract_body(&fixture.page());
        assert_eq!(
            body.value(),
            "Titolo Primo paragrafo dell'articolo. Secondo paragrafo."
        );
    }

    #[test]
    fn test_container_fallback_leaves_shared_document_untouched() {
        let fixture = Fixture::new(ARTICLE);
        let before = fixture.document.root_element().html();
        let _ = from_container(&fixture.page());
        assert_eq!(fixture.document.root_element().html(), before);
    }

    #[test]
    fn test_container_order_follows_configuration() {
        let fixture = Fixture::new(
            r#"<html><body><div class="content">Contenuto div</div><main>Contenuto main</main></body></html>"#,
        );
        assert_eq!(from_container(&fixture.page()).unwrap(), "Contenuto main");
    }

    #[test]
    fn test_no_container_yields_placeholder_with_url() {
        let fixture = Fixture::new("<html><body><p>fuori</p></body></html>");
        let body = extract_body(&fixture.page());
        assert!(body.is_placeholder());
        assert!(body.value().contains(fixture.url.as_str()));
    }
}
