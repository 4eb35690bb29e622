//! Listing page parser
//!
//! Extracts the product listing template: hero block (name, website, description,
//! rating, pricing, platforms), the link group (alternatives, status, social
//! profiles), breadcrumbs, screenshots, videos, external reviews and Q&A.
//! Relative links are resolved against the site base URL.

#![allow(clippy::uninlined_format_args)]

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{FieldExtractor, ParsingError, ParsingResult};
use crate::domain::{CanonicalUrl, FieldKind, Record, RecordSchema};

static WINDOW_OPEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"window\.open\('(.+?)'\)").expect("static regex"));
static FIRST_NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("static regex"));

const MAX_SCREENSHOTS: usize = 5;
const MAX_VIDEOS: usize = 5;
const MAX_EXTERNAL_SOURCES: usize = 3;

/// Title keyword → record field for the profile link group
const PROFILE_LINKS: &[(&str, &str)] = &[
    ("linkedin", "LinkedIn"),
    ("google play", "GooglePlayURL"),
    ("github", "GithubURL"),
    ("facebook", "FacebookURL"),
    ("instagram", "InstagramURL"),
    ("crunchbase", "CrunchbaseURL"),
    ("twitter", "TwitterURL"),
];

struct Selectors {
    logo: Selector,
    company_name: Selector,
    website_link: Selector,
    website_button: Selector,
    description: Selector,
    rating: Selector,
    reviews: Selector,
    pricing_items: Selector,
    pricing_links: Selector,
    platforms: Selector,
    link_group: Selector,
    verified: Selector,
    tags: Selector,
    category: Selector,
    related_category: Selector,
    screenshots: Selector,
    features: Selector,
    videos: Selector,
    external_titles: Selector,
    external_texts: Selector,
    external_anchors: Selector,
    questions: Selector,
    mentions: Selector,
}

impl Selectors {
    fn compile() -> ParsingResult<Self> {
        Ok(Self {
            logo: compile("figure.image.is-96x96 img")?,
            company_name: compile("section.hero.is-primary .flex-columns > .flex-1 > h2 > span")?,
            website_link: compile("section.hero.is-primary .flex-wrap.gap-2 > a.btn.btn--hero.btn--success.track-event")?,
            website_button: compile("section.hero.is-primary .flex-wrap.gap-2 > button.btn.btn--hero.btn--success.track-event")?,
            description: compile("h3.text-lg.font-normal.mb-2")?,
            rating: compile(".service-rating b")?,
            reviews: compile(".service-rating span")?,
            pricing_items: compile("div[itemprop=\"offers\"] ul li")?,
            pricing_links: compile("div[itemprop=\"offers\"] ul li a")?,
            platforms: compile("section.hero.is-primary .space-y-4.mt-4 > div:nth-child(3) ul li span")?,
            link_group: compile("div.flex-1.flex.flex-wrap.gap-2 a")?,
            verified: compile("span.badge-verified")?,
            tags: compile(".tag-links a")?,
            category: compile("nav.breadcrumbs ol li:nth-child(2) a span")?,
            related_category: compile("nav.breadcrumbs ol li:nth-child(3) a span")?,
            screenshots: compile("figure.screenshot img")?,
            features: compile("#features > ol")?,
            videos: compile(".grid lite-youtube[videoid]")?,
            external_titles: compile(".boxed#external-reviews .space-y-2 strong a")?,
            external_texts: compile(".boxed#external-reviews .space-y-2 .description")?,
            external_anchors: compile(".boxed#external-reviews .space-y-2 .text-sm.text-links.italic b a")?,
            questions: compile(".boxed.boxed--more-space#questions ol")?,
            mentions: compile("#mentions > ul")?,
        })
    }
}

fn compile(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Parser for the listing page template
pub struct ListingPageParser {
    base_url: Url,
    selectors: Selectors,
    schema: RecordSchema,
}

impl ListingPageParser {
    pub fn new(base_url: &str) -> ParsingResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|_| ParsingError::InvalidBaseUrl(base_url.to_string()))?;
        Ok(Self {
            base_url,
            selectors: Selectors::compile()?,
            schema: Self::declared_schema(),
        })
    }

    /// Columns in export order
    pub fn declared_schema() -> RecordSchema {
        let mut schema = RecordSchema::new()
            .field("url", FieldKind::Url)
            .field("LogoURL", FieldKind::Url)
            .field("CompanyName", FieldKind::Text)
            .field("Website", FieldKind::Url)
            .field("CompanyDescription", FieldKind::Text)
            .field("rating", FieldKind::Text)
            .field("Number of reviews", FieldKind::Integer)
            .field("pricingText", FieldKind::Text)
            .field("pricingURL", FieldKind::Url)
            .field("platforms", FieldKind::Text)
            .field("AlternativesPageURL", FieldKind::Url)
            .field("StatusPageURL", FieldKind::Url)
            .field("RSSFeedURL", FieldKind::Url);
        for (_, field) in PROFILE_LINKS {
            schema = schema.field(*field, FieldKind::Url);
        }
        schema = schema
            .field("Verified?", FieldKind::Text)
            .field("tags", FieldKind::Text)
            .field("Categories", FieldKind::Text);
        for i in 1..=MAX_SCREENSHOTS {
            schema = schema.field(format!("Img{}", i), FieldKind::Url);
        }
        schema = schema.field("Features & Specs", FieldKind::Html);
        for i in 1..=MAX_VIDEOS {
            schema = schema.field(format!("Video{}", i), FieldKind::Url);
        }
        for i in 1..=MAX_EXTERNAL_SOURCES {
            schema = schema
                .field(format!("External source: Title{}", i), FieldKind::Text)
                .field(format!("External source: Text{}", i), FieldKind::Text)
                .field(format!("External source: AnchorText{}", i), FieldKind::Text)
                .field(format!("External source: AnchorLink{}", i), FieldKind::Url);
        }
        schema
            .field("Q&A", FieldKind::Html)
            .field("Social Recommendations & Mentions Text", FieldKind::Html)
    }

    fn resolve(&self, href: &str) -> String {
        self.base_url
            .join(href.trim())
            .map_or_else(|_| href.trim().to_string(), String::from)
    }

    fn website(&self, document: &Html) -> Option<String> {
        if let Some(href) = first_attr(document, &self.selectors.website_link, "href") {
            return Some(href);
        }
        let onclick = first_attr(document, &self.selectors.website_button, "onclick")?;
        WINDOW_OPEN_PATTERN
            .captures(&onclick)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn review_count(&self, document: &Html) -> i64 {
        first_text(document, &self.selectors.reviews)
            .and_then(|text| {
                FIRST_NUMBER_PATTERN
                    .captures(&text)
                    .and_then(|c| c[1].parse().ok())
            })
            .unwrap_or(0)
    }

    fn pricing_url(&self, document: &Html) -> Option<String> {
        document
            .select(&self.selectors.pricing_links)
            .find(|a| element_text(a).contains("Pricing"))
            .and_then(|a| a.value().attr("href"))
            .map(|href| self.resolve(href))
    }

    /// First link-group anchor matching `predicate`, resolved
    fn group_link(&self, document: &Html, predicate: impl Fn(&ElementRef<'_>) -> bool) -> Option<String> {
        document
            .select(&self.selectors.link_group)
            .find(|a| predicate(a))
            .and_then(|a| a.value().attr("href"))
            .map(|href| self.resolve(href))
    }

    fn categories(&self, document: &Html) -> Option<String> {
        let category = first_text(document, &self.selectors.category);
        let related = first_text(document, &self.selectors.related_category);
        match (category, related) {
            (Some(c), Some(r)) => Some(format!("{}, {}", c, r)),
            (c, r) => c.or(r),
        }
    }
}

impl FieldExtractor for ListingPageParser {
    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn extract(&self, body: &str, url: &CanonicalUrl) -> ParsingResult<Record> {
        let document = Html::parse_document(body);
        let s = &self.selectors;
        let mut record = Record::for_url(url);

        record.set_text("LogoURL", first_attr(&document, &s.logo, "src"));
        record.set_text("CompanyName", first_text(&document, &s.company_name));
        record.set_text("Website", self.website(&document));
        record.set_text("CompanyDescription", first_text(&document, &s.description));
        record.set_text(
            "rating",
            Some(first_text(&document, &s.rating).unwrap_or_else(|| "0".to_string())),
        );
        record.set_integer("Number of reviews", self.review_count(&document));
        record.set_text(
            "pricingText",
            join_non_empty(
                document
                    .select(&s.pricing_items)
                    .map(|li| element_text(&li))
                    .filter(|text| text != "Official Pricing"),
                "; ",
            ),
        );
        record.set_text("pricingURL", self.pricing_url(&document));
        record.set_text(
            "platforms",
            join_non_empty(document.select(&s.platforms).map(|e| element_text(&e)), ", "),
        );

        record.set_text(
            "AlternativesPageURL",
            self.group_link(&document, |a| element_text(a).contains("Alternatives")),
        );
        record.set_text(
            "StatusPageURL",
            self.group_link(&document, |a| element_text(a).contains("Status")),
        );
        record.set_text(
            "RSSFeedURL",
            self.group_link(&document, |a| title_of(a).contains("Blog")),
        );
        for (keyword, field) in PROFILE_LINKS {
            let link = self.group_link(&document, |a| title_of(a).to_lowercase().contains(keyword));
            record.set_text(field, link);
        }

        let verified = document.select(&s.verified).next().is_some();
        record.set_text("Verified?", Some(if verified { "Yes" } else { "No" }.to_string()));
        record.set_text(
            "tags",
            join_non_empty(document.select(&s.tags).map(|e| element_text(&e)), ", "),
        );
        record.set_text("Categories", self.categories(&document));

        let screenshots: Vec<String> = document
            .select(&s.screenshots)
            .filter_map(|img| img.value().attr("src"))
            .map(|src| self.resolve(src))
            .collect();
        for i in 0..MAX_SCREENSHOTS {
            record.set_text(&format!("Img{}", i + 1), screenshots.get(i).cloned());
        }

        record.set_text("Features & Specs", first_inner_html(&document, &s.features));

        let videos: Vec<String> = document
            .select(&s.videos)
            .filter_map(|v| v.value().attr("videoid"))
            .map(|id| format!("https://www.youtube.com/watch?v={}", id))
            .collect();
        for i in 0..MAX_VIDEOS {
            record.set_text(&format!("Video{}", i + 1), videos.get(i).cloned());
        }

        let titles: Vec<String> = document.select(&s.external_titles).map(|e| element_text(&e)).collect();
        let texts: Vec<String> = document.select(&s.external_texts).map(|e| element_text(&e)).collect();
        let anchors: Vec<ElementRef<'_>> = document.select(&s.external_anchors).collect();
        for i in 0..MAX_EXTERNAL_SOURCES {
            let n = i + 1;
            record.set_text(&format!("External source: Title{}", n), non_empty(titles.get(i)));
            record.set_text(&format!("External source: Text{}", n), non_empty(texts.get(i)));
            record.set_text(
                &format!("External source: AnchorText{}", n),
                anchors.get(i).map(element_text).filter(|t| !t.is_empty()),
            );
            record.set_text(
                &format!("External source: AnchorLink{}", n),
                anchors
                    .get(i)
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string),
            );
        }

        record.set_text("Q&A", first_inner_html(&document, &s.questions));
        record.set_text(
            "Social Recommendations & Mentions Text",
            document.select(&s.mentions).next().map(|e| e.html()),
        );

        debug!("Extracted {} fields from {}", record.len(), url);
        Ok(record)
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn title_of<'a>(element: &ElementRef<'a>) -> &'a str {
    element.value().attr("title").unwrap_or("")
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|e| element_text(&e))
        .filter(|text| !text.is_empty())
}

fn first_attr(document: &Html, selector: &Selector, attr: &str) -> Option<String> {
    document
        .select(selector)
        .find_map(|e| e.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn first_inner_html(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|e| e.inner_html().trim().to_string())
        .filter(|html| !html.is_empty())
}

fn join_non_empty(items: impl Iterator<Item = String>, separator: &str) -> Option<String> {
    let items: Vec<String> = items.filter(|s| !s.is_empty()).collect();
    (!items.is_empty()).then(|| items.join(separator))
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}
