//! Turns one rendered snapshot into product records.

use crate::config::Selectors;
use crate::record::ProductRecord;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

fn compile(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Outcome of looking up one field inside a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// No matching sub-node.
    Missing,
    Found(String),
    /// The node exists but carries nothing usable.
    Malformed(String),
}

impl Field {
    pub fn into_option(self) -> Option<String> {
        match self {
            Field::Found(v) => Some(v),
            Field::Missing | Field::Malformed(_) => None,
        }
    }
}

/// A field that matched a node but could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedField {
    pub card: usize,
    pub field: &'static str,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct PageExtraction {
    pub records: Vec<ProductRecord>,
    pub malformed: Vec<MalformedField>,
}

impl PageExtraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

struct CardSelectors {
    card: Selector,
    title: Selector,
    image: Selector,
    original_price: Selector,
    discounted_price: Selector,
    offer: Selector,
    brand: Selector,
    options: Selector,
}

pub struct PageExtractor {
    sel: CardSelectors,
}

impl PageExtractor {
    pub fn new(selectors: &Selectors) -> Result<Self, SelectorError> {
        Ok(Self {
            sel: CardSelectors {
                card: compile(&selectors.product_card)?,
                title: compile(&selectors.title)?,
                image: compile(&selectors.image)?,
                original_price: compile(&selectors.original_price)?,
                discounted_price: compile(&selectors.discounted_price)?,
                offer: compile(&selectors.offer)?,
                brand: compile(&selectors.brand)?,
                options: compile(&selectors.options)?,
            },
        })
    }

    pub fn extract(&self, html: &str, section: &str) -> PageExtraction {
        let doc = Html::parse_document(html);
        let mut page = PageExtraction::default();

        for (index, card) in doc.select(&self.sel.card).enumerate() {
            let record = self.extract_card(card, section, index, &mut page.malformed);
            page.records.push(record);
        }

        debug!(section, cards = page.records.len(), "extracted page");
        page
    }

    fn extract_card(
        &self,
        card: ElementRef<'_>,
        section: &str,
        index: usize,
        malformed: &mut Vec<MalformedField>,
    ) -> ProductRecord {
        let mut keep = |field: &'static str, value: Field| -> Option<String> {
            if let Field::Malformed(reason) = &value {
                warn!(section, card = index, field, reason = %reason, "malformed field");
                malformed.push(MalformedField {
                    card: index,
                    field,
                    reason: reason.clone(),
                });
            }
            value.into_option()
        };

        let title = card.select(&self.sel.title).next();
        let image = card.select(&self.sel.image).next();

        ProductRecord {
            section: section.to_string(),
            product_name: keep("Product Name", text_field(title)),
            product_url: keep("Product URL", attr_field(title, "href")),
            product_image: keep("Product Image", attr_field(image, "src")),
            original_price: keep(
                "Original Price",
                text_field(card.select(&self.sel.original_price).next()),
            ),
            discounted_price: keep(
                "Discounted Price",
                text_field(card.select(&self.sel.discounted_price).next()),
            ),
            discount_text: keep("Discount/Offer Text", text_field(card.select(&self.sel.offer).next())),
            brand_name: keep("Brand Name", text_field(card.select(&self.sel.brand).next())),
            options: keep("Different Options", self.options_field(card)),
        }
    }

    fn options_field(&self, card: ElementRef<'_>) -> Field {
        let labels: Vec<String> = card.select(&self.sel.options).map(stripped_text).collect();
        if labels.is_empty() {
            Field::Missing
        } else {
            Field::Found(labels.join(", "))
        }
    }
}

/// The attribute exactly as written; a blank value is a lazy-load
/// placeholder, not a link.
fn attr_field(node: Option<ElementRef<'_>>, attr: &str) -> Field {
    let Some(node) = node else {
        return Field::Missing;
    };
    match node.value().attr(attr) {
        None => Field::Malformed(format!("<{}> has no {} attribute", node.value().name(), attr)),
        Some(raw) if raw.trim().is_empty() => {
            Field::Malformed(format!("<{}> has a blank {} attribute", node.value().name(), attr))
        }
        Some(raw) => Field::Found(raw.to_string()),
    }
}

fn text_field(node: Option<ElementRef<'_>>) -> Field {
    match node {
        Some(node) => Field::Found(stripped_text(node)),
        None => Field::Missing,
    }
}

/// Every descendant text node trimmed, empty pieces dropped, the rest
/// concatenated without a separator.
fn stripped_text(node: ElementRef<'_>) -> String {
    node.text().map(str::trim).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> PageExtractor {
        PageExtractor::new(&Selectors::default()).unwrap()
    }

    fn page(cards: &[String]) -> String {
        format!("<html><body><div class=\"grid\">{}</div></body></html>", cards.concat())
    }

    const PARTS: [&str; 7] = [
        r#"<a class="product-title" href="/p/42"> Eau de <b>Parfum</b> </a>"#,
        r#"<img src="/img/42.jpg">"#,
        r#"<span class="original-price">THB 4,200</span>"#,
        r#"<span class="discounted-price">THB 3,150</span>"#,
        r#"<div class="offer">Save 25%</div>"#,
        r#"<span class="brand-name">Maison</span>"#,
        r#"<ul class="options"><li>50ml</li><li>100ml</li></ul>"#,
    ];

    fn card_with(mask: u32) -> String {
        let body: String = PARTS
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, p)| *p)
            .collect();
        format!(r#"<div class="product-item">{}</div>"#, body)
    }

    #[test]
    fn every_subset_of_fields_is_independent() {
        let ex = extractor();
        for mask in 0..(1u32 << PARTS.len()) {
            let out = ex.extract(&page(&[card_with(mask)]), "Beauty");
            assert_eq!(out.records.len(), 1, "mask {:07b}", mask);
            let r = &out.records[0];
            let has = |bit: u32| mask & (1 << bit) != 0;

            assert_eq!(r.section, "Beauty");
            assert_eq!(r.product_name.as_deref(), has(0).then_some("Eau deParfum"), "mask {:07b}", mask);
            assert_eq!(r.product_url.as_deref(), has(0).then_some("/p/42"), "mask {:07b}", mask);
            assert_eq!(r.product_image.as_deref(), has(1).then_some("/img/42.jpg"), "mask {:07b}", mask);
            assert_eq!(r.original_price.as_deref(), has(2).then_some("THB 4,200"), "mask {:07b}", mask);
            assert_eq!(r.discounted_price.as_deref(), has(3).then_some("THB 3,150"), "mask {:07b}", mask);
            assert_eq!(r.discount_text.as_deref(), has(4).then_some("Save 25%"), "mask {:07b}", mask);
            assert_eq!(r.brand_name.as_deref(), has(5).then_some("Maison"), "mask {:07b}", mask);
            assert_eq!(r.options.as_deref(), has(6).then_some("50ml, 100ml"), "mask {:07b}", mask);
            assert!(out.malformed.is_empty());
        }
    }

    #[test]
    fn joins_option_labels() {
        let card = r#"<div class="product-item"><ul class="options">
            <li> Red </li><li>Large</li><li>Gift-wrap</li></ul></div>"#;
        let out = extractor().extract(&page(&[card.to_string()]), "A");
        assert_eq!(out.records[0].options.as_deref(), Some("Red, Large, Gift-wrap"));
    }

    #[test]
    fn empty_option_list_is_null() {
        let card = r#"<div class="product-item"><ul class="options"></ul></div>"#;
        let out = extractor().extract(&page(&[card.to_string()]), "A");
        assert_eq!(out.records[0].options, None);
    }

    #[test]
    fn page_without_cards_yields_nothing() {
        let out = extractor().extract("<html><body><p>Sorry, nothing here</p></body></html>", "A");
        assert!(out.is_empty());
        assert!(out.malformed.is_empty());
    }

    #[test]
    fn keeps_card_order() {
        let cards: Vec<String> = ["one", "two", "three"]
            .iter()
            .map(|n| format!(r#"<div class="product-item"><a class="product-title" href="/{n}">{n}</a></div>"#))
            .collect();
        let out = extractor().extract(&page(&cards), "A");
        let names: Vec<_> = out.records.iter().filter_map(|r| r.product_name.as_deref()).collect();
        assert_eq!(names, ["one", "two", "three"]);
    }

    #[test]
    fn anchor_without_href_only_nulls_the_url() {
        let card = r#"<div class="product-item"><a class="product-title">Tote</a>
            <span class="brand-name">Coach</span></div>"#;
        let out = extractor().extract(&page(&[card.to_string()]), "Bags");
        let r = &out.records[0];
        assert_eq!(r.product_name.as_deref(), Some("Tote"));
        assert_eq!(r.product_url, None);
        assert_eq!(r.brand_name.as_deref(), Some("Coach"));
        assert_eq!(out.malformed.len(), 1);
        assert_eq!(out.malformed[0].field, "Product URL");
        assert_eq!(out.malformed[0].card, 0);
    }

    #[test]
    fn blank_links_are_malformed_not_guessed() {
        let card = r#"<div class="product-item"><a class="product-title" href="">Tote</a>
            <img src="  "><span class="brand-name">Coach</span></div>"#;
        let out = extractor().extract(&page(&[card.to_string()]), "Bags");
        let r = &out.records[0];
        assert_eq!(r.product_name.as_deref(), Some("Tote"));
        assert_eq!(r.product_url, None);
        assert_eq!(r.product_image, None);
        assert_eq!(r.brand_name.as_deref(), Some("Coach"));
        let fields: Vec<_> = out.malformed.iter().map(|m| m.field).collect();
        assert_eq!(fields, ["Product URL", "Product Image"]);
    }

    #[test]
    fn relative_links_are_kept_verbatim() {
        let card = r#"<div class="product-item"><a class="product-title" href="p/42">Watch</a>
            <img src="//cdn.example/42.webp"></div>"#;
        let out = extractor().extract(&page(&[card.to_string()]), "Watches");
        let r = &out.records[0];
        assert_eq!(r.product_url.as_deref(), Some("p/42"));
        assert_eq!(r.product_image.as_deref(), Some("//cdn.example/42.webp"));
        assert!(out.malformed.is_empty());
    }

    #[test]
    fn rejects_bad_selector() {
        let selectors = Selectors {
            product_card: "div[".into(),
            ..Selectors::default()
        };
        let err = PageExtractor::new(&selectors).err().unwrap();
        assert_eq!(err.selector, "div[");
    }
}
