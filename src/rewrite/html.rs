//! Document rewriting over a streaming HTML rewriter.
//!
//! The pass removes archive-injected replay chrome and policy-selected
//! elements (trackers, ads, external iframes), unwraps and localizes every
//! reference, and harvests same-site discoveries — all in one streaming
//! rewrite. Inline `<script>` removal decisions need the script *content*,
//! which an element handler cannot see, so documents take two passes: the
//! first collects inline script texts, the second rewrites with the removal
//! set in hand.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::LazyLock;

use lol_html::html_content::{ContentType, Element};
use lol_html::{RewriteStrSettings, doc_comments, element, rewrite_str, text};
use regex::Regex;
use tracing::trace;

use super::{DiscoveryList, RewriteContext, RewriteError, RewriteOutcome, css, preserve};
use crate::config::{ExternalLinkPolicy, Policy};
use crate::site;
use crate::snapshot::codec;

/// Element ids marking archive replay chrome (toolbars, banners).
const ARCHIVE_CHROME_IDS: &[&str] = &["wm-ipp", "wm-bipp", "wm-toolbar"];

/// Reference substrings marking archive replay scripts.
const ARCHIVE_SCRIPT_MARKERS: &[&str] = &[
    "web.archive.org",
    "web-static.archive.org",
    "bundle-playback.js",
    "wombat.js",
    "ruffle.js",
];

/// Reference substrings marking archive replay stylesheets.
const ARCHIVE_LINK_MARKERS: &[&str] =
    &["banner-styles.css", "iconochive.css", "web-static.archive.org"];

/// Inline-script content fragments marking archive replay bootstrap code.
const ARCHIVE_SCRIPT_CONTENT: &[&str] = &["__wm", "wombat", "RufflePlayer", "web.archive.org"];

/// Class fragments marking cookie-consent containers.
const COOKIE_CONTAINER_MARKERS: &[&str] =
    &["cookie", "consent", "cookiebar", "cookie-banner", "cookieyes"];

/// Class fragments marking cookie-consent buttons/links.
const COOKIE_BUTTON_MARKERS: &[&str] = &["cookie", "consent", "accept", "reject"];

/// Email address shape for contact recovery from wrapped URLs.
#[allow(clippy::expect_used)]
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email regex is valid")
});

/// Mutable state threaded through the streaming handlers.
#[derive(Default)]
struct DocState {
    discovered: DiscoveryList,
    suppressed: usize,
    /// Nesting depth inside preserve containers; anchors inside are passed
    /// through with wrapper-unwrapping only.
    preserve_depth: usize,
    /// Document-order index of the current `<script>` element, shared with
    /// the analysis pass.
    script_index: usize,
    /// Accumulates `<style>` text chunks until the node ends.
    style_buffer: String,
}

/// Rewrites one HTML document.
///
/// # Errors
///
/// [`RewriteError::Markup`] when the streaming rewriter rejects the input;
/// the caller persists the original payload verbatim.
pub fn rewrite_document(
    html: &str,
    ctx: &RewriteContext<'_>,
) -> Result<RewriteOutcome, RewriteError> {
    let inline_scripts = collect_inline_scripts(html, ctx.policy)?;
    let flagged = flag_inline_scripts(&inline_scripts, ctx.policy);
    trace!(
        scripts = inline_scripts.len(),
        flagged = flagged.len(),
        "inline script analysis"
    );

    let state = Rc::new(RefCell::new(DocState::default()));

    let output = {
        let generic_state = Rc::clone(&state);
        let script_state = Rc::clone(&state);
        let anchor_state = Rc::clone(&state);
        let img_state = Rc::clone(&state);
        let link_state = Rc::clone(&state);
        let iframe_state = Rc::clone(&state);
        let style_attr_state = Rc::clone(&state);
        let style_text_state = Rc::clone(&state);

        rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: vec![
                    element!("*", move |el| {
                        handle_generic(el, ctx.policy, &generic_state);
                        Ok(())
                    }),
                    element!("script", move |el| {
                        handle_script(el, ctx, &script_state, &flagged)?;
                        Ok(())
                    }),
                    element!("link[href]", move |el| {
                        handle_link(el, ctx, &link_state)?;
                        Ok(())
                    }),
                    element!("meta", move |el| {
                        handle_meta(el);
                        Ok(())
                    }),
                    element!("iframe[src]", move |el| {
                        handle_iframe(el, ctx, &iframe_state)?;
                        Ok(())
                    }),
                    element!("img[src]", move |el| {
                        handle_img(el, ctx, &img_state)?;
                        Ok(())
                    }),
                    element!("a[href]", move |el| {
                        handle_anchor(el, ctx, &anchor_state)?;
                        Ok(())
                    }),
                    element!("[style]", move |el| {
                        handle_style_attribute(el, ctx, &style_attr_state)?;
                        Ok(())
                    }),
                    text!("style", move |chunk| {
                        let mut state = style_text_state.borrow_mut();
                        state.style_buffer.push_str(chunk.as_str());
                        if chunk.last_in_text_node() {
                            let buffered = std::mem::take(&mut state.style_buffer);
                            let outcome = css::rewrite_stylesheet(&buffered, ctx);
                            for normalized in outcome.discovered {
                                state.discovered.push(normalized);
                            }
                            state.suppressed += outcome.suppressed;
                            chunk.replace(&outcome.payload, ContentType::Html);
                        } else {
                            chunk.remove();
                        }
                        Ok(())
                    }),
                ],
                document_content_handlers: vec![doc_comments!(|comment| {
                    comment.remove();
                    Ok(())
                })],
                ..RewriteStrSettings::default()
            },
        )
        .map_err(|error| RewriteError::Markup {
            reason: error.to_string(),
        })?
    };

    let mut state = state.borrow_mut();
    Ok(RewriteOutcome {
        payload: output,
        discovered: std::mem::take(&mut state.discovered).into_vec(),
        suppressed: state.suppressed,
    })
}

/// First pass: inline script texts in document order. Scripts with a `src`
/// attribute contribute empty entries, and the pass applies the same
/// structural removals as the rewrite pass, so both passes index the
/// surviving scripts identically.
fn collect_inline_scripts(html: &str, policy: &Policy) -> Result<Vec<String>, RewriteError> {
    let scripts: Rc<RefCell<Vec<String>>> = Rc::default();
    let on_element = Rc::clone(&scripts);
    let on_text = Rc::clone(&scripts);

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("*", move |el| {
                    apply_structural_removals(el, policy);
                    Ok(())
                }),
                element!("script", move |_el| {
                    on_element.borrow_mut().push(String::new());
                    Ok(())
                }),
                text!("script", move |chunk| {
                    if let Some(current) = on_text.borrow_mut().last_mut() {
                        current.push_str(chunk.as_str());
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|error| RewriteError::Markup {
        reason: error.to_string(),
    })?;

    Ok(Rc::try_unwrap(scripts)
        .map(RefCell::into_inner)
        .unwrap_or_else(|shared| shared.borrow().clone()))
}

/// Which inline scripts to remove: archive replay bootstrap always, tracking
/// and consent tooling when the policy says so.
fn flag_inline_scripts(scripts: &[String], policy: &Policy) -> HashSet<usize> {
    scripts
        .iter()
        .enumerate()
        .filter_map(|(index, content)| {
            if content.trim().is_empty() {
                return None;
            }
            if ARCHIVE_SCRIPT_CONTENT
                .iter()
                .any(|fragment| content.contains(fragment))
            {
                return Some(index);
            }
            if policy.remove_trackers && site::is_tracker_script_content(content) {
                return Some(index);
            }
            None
        })
        .collect()
}

/// Archive chrome by id and cookie-consent containers/buttons. Shared by
/// both passes so they skip identical subtrees. Returns whether the element
/// was removed.
fn apply_structural_removals(el: &mut Element<'_, '_>, policy: &Policy) -> bool {
    if let Some(id) = el.get_attribute("id") {
        let lowered = id.to_lowercase();
        if ARCHIVE_CHROME_IDS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            el.remove();
            return true;
        }
    }

    if policy.remove_trackers {
        let class = el.get_attribute("class");
        let tag = el.tag_name();
        if matches!(tag.as_str(), "div" | "section")
            && class_contains_any(class.as_deref(), COOKIE_CONTAINER_MARKERS)
        {
            el.remove();
            return true;
        }
        if matches!(tag.as_str(), "button" | "a")
            && class_contains_any(class.as_deref(), COOKIE_BUTTON_MARKERS)
        {
            el.remove();
            return true;
        }
    }

    false
}

/// Structural removals plus preserve-container depth tracking.
fn handle_generic(el: &mut Element<'_, '_>, policy: &Policy, state: &Rc<RefCell<DocState>>) {
    if apply_structural_removals(el, policy) {
        return;
    }

    let id = el.get_attribute("id");
    let class = el.get_attribute("class");
    if preserve::is_preserve_container(id.as_deref(), class.as_deref())
        && let Some(handlers) = el.end_tag_handlers()
    {
        state.borrow_mut().preserve_depth += 1;
        let on_end = Rc::clone(state);
        handlers.push(Box::new(move |_end| {
            on_end.borrow_mut().preserve_depth -= 1;
            Ok(())
        }));
    }
}

type HandlerError = Box<dyn std::error::Error + Send + Sync>;

fn handle_script(
    el: &mut Element<'_, '_>,
    ctx: &RewriteContext<'_>,
    state: &Rc<RefCell<DocState>>,
    flagged: &HashSet<usize>,
) -> Result<(), HandlerError> {
    let index = {
        let mut state = state.borrow_mut();
        let index = state.script_index;
        state.script_index += 1;
        index
    };
    if el.removed() {
        return Ok(());
    }

    let Some(src) = el.get_attribute("src") else {
        if flagged.contains(&index) {
            el.remove();
        }
        return Ok(());
    };

    let unwrapped = codec::extract_original(&src);
    let chrome = match &unwrapped {
        Some(raw) => is_marked(raw, ARCHIVE_SCRIPT_MARKERS),
        None => is_marked(&src, ARCHIVE_SCRIPT_MARKERS),
    };
    if chrome {
        el.remove();
        return Ok(());
    }

    let raw = unwrapped.unwrap_or_else(|| src.clone());
    if ctx.policy.remove_trackers && site::is_tracker(&raw) {
        el.remove();
        return Ok(());
    }
    if ctx.policy.remove_ads && site::is_advertisement(&raw) {
        el.remove();
        return Ok(());
    }

    if let Some(normalized) = ctx.mirrorable(&raw) {
        el.set_attribute("src", &ctx.internal_href(&normalized, false))?;
        state.borrow_mut().discovered.push(normalized);
    } else if raw != src {
        el.set_attribute("src", &raw)?;
    }
    Ok(())
}

fn handle_link(
    el: &mut Element<'_, '_>,
    ctx: &RewriteContext<'_>,
    state: &Rc<RefCell<DocState>>,
) -> Result<(), HandlerError> {
    if el.removed() {
        return Ok(());
    }
    let Some(href) = el.get_attribute("href") else {
        return Ok(());
    };

    let unwrapped = codec::extract_original(&href);
    let chrome = match &unwrapped {
        Some(raw) => is_marked(raw, ARCHIVE_LINK_MARKERS),
        None => is_marked(&href, ARCHIVE_LINK_MARKERS),
    };
    if chrome {
        el.remove();
        return Ok(());
    }

    let raw = unwrapped.unwrap_or_else(|| href.clone());
    if let Some(normalized) = ctx.mirrorable(&raw) {
        el.set_attribute("href", &ctx.internal_href(&normalized, false))?;
        state.borrow_mut().discovered.push(normalized);
        return Ok(());
    }

    let rel = el.get_attribute("rel").unwrap_or_default().to_lowercase();
    let is_stylesheet = rel.split_whitespace().any(|token| token == "stylesheet");
    if is_stylesheet && ctx.policy.external_links == ExternalLinkPolicy::Drop {
        el.remove();
    } else if raw != href {
        // External but wrapped: point it back at the live origin.
        el.set_attribute("href", &raw)?;
    }
    Ok(())
}

fn handle_meta(el: &mut Element<'_, '_>) {
    if el.removed() {
        return;
    }
    let property = el.get_attribute("property").unwrap_or_default();
    let content = el.get_attribute("content").unwrap_or_default();
    if property.eq_ignore_ascii_case("og:url") && content.contains(codec::ARCHIVE_HOST) {
        el.remove();
    }
}

fn handle_iframe(
    el: &mut Element<'_, '_>,
    ctx: &RewriteContext<'_>,
    state: &Rc<RefCell<DocState>>,
) -> Result<(), HandlerError> {
    if el.removed() {
        return Ok(());
    }
    let Some(src) = el.get_attribute("src") else {
        return Ok(());
    };
    let raw = codec::extract_original(&src).unwrap_or_else(|| src.clone());

    if ctx.policy.remove_ads && site::is_advertisement(&raw) {
        el.remove();
        return Ok(());
    }

    match ctx.normalize(&raw) {
        Some(normalized) if ctx.scope.is_internal(normalized.url.as_str()) => {
            el.set_attribute("src", &ctx.internal_href(&normalized, true))?;
            state.borrow_mut().discovered.push(normalized);
        }
        Some(_) if ctx.policy.remove_external_iframes => {
            el.remove();
        }
        _ => {
            if raw != src {
                el.set_attribute("src", &raw)?;
            }
        }
    }
    Ok(())
}

fn handle_img(
    el: &mut Element<'_, '_>,
    ctx: &RewriteContext<'_>,
    state: &Rc<RefCell<DocState>>,
) -> Result<(), HandlerError> {
    if el.removed() {
        return Ok(());
    }
    let Some(src) = el.get_attribute("src") else {
        return Ok(());
    };
    let raw = codec::extract_original(&src).unwrap_or_else(|| src.clone());

    if ctx.policy.remove_ads && site::is_advertisement(&raw) {
        el.remove();
        return Ok(());
    }

    if let Some(normalized) = ctx.mirrorable(&raw) {
        el.set_attribute("src", &ctx.internal_href(&normalized, false))?;
        state.borrow_mut().discovered.push(normalized);
    } else if raw != src {
        el.set_attribute("src", &raw)?;
    }
    Ok(())
}

fn handle_anchor(
    el: &mut Element<'_, '_>,
    ctx: &RewriteContext<'_>,
    state: &Rc<RefCell<DocState>>,
) -> Result<(), HandlerError> {
    if el.removed() {
        return Ok(());
    }
    let Some(href) = el.get_attribute("href") else {
        return Ok(());
    };

    if state.borrow().preserve_depth > 0 {
        if let Some(recovered) = recover_preserved_href(&href) {
            el.set_attribute("href", &recovered)?;
        }
        return Ok(());
    }

    let raw = codec::extract_original(&href).unwrap_or_else(|| href.clone());

    if site::is_contact(&raw) {
        if ctx.policy.remove_clickable_contacts {
            el.set_attribute("href", "#")?;
        } else if raw != href {
            el.set_attribute("href", &raw)?;
        }
        return Ok(());
    }

    match ctx.normalize(&raw) {
        Some(normalized) if ctx.scope.is_internal(normalized.url.as_str()) => {
            el.set_attribute("href", &ctx.internal_href(&normalized, true))?;
            state.borrow_mut().discovered.push(normalized);
        }
        Some(normalized) => match ctx.policy.external_links {
            ExternalLinkPolicy::Drop => el.remove(),
            ExternalLinkPolicy::Neutralize => el.remove_and_keep_content(),
            ExternalLinkPolicy::Keep => {
                el.set_attribute("href", normalized.url.as_str())?;
            }
        },
        // javascript:, data:, unparseable — none of our business.
        None => {}
    }
    Ok(())
}

fn handle_style_attribute(
    el: &mut Element<'_, '_>,
    ctx: &RewriteContext<'_>,
    state: &Rc<RefCell<DocState>>,
) -> Result<(), HandlerError> {
    if el.removed() {
        return Ok(());
    }
    let Some(style) = el.get_attribute("style") else {
        return Ok(());
    };
    if !style.contains("url(") && !style.contains("/web/") {
        return Ok(());
    }

    let outcome = css::rewrite_stylesheet(&style, ctx);
    {
        let mut state = state.borrow_mut();
        for normalized in outcome.discovered {
            state.discovered.push(normalized);
        }
        state.suppressed += outcome.suppressed;
    }
    if outcome.payload != style {
        el.set_attribute("style", &outcome.payload)?;
    }
    Ok(())
}

/// Restores the usable form of a preserve-container reference: wrapped
/// contact schemes come back as-is, emails hidden behind a wrapped http URL
/// become `mailto:`, anything else unwraps to its original URL.
fn recover_preserved_href(href: &str) -> Option<String> {
    let original = codec::extract_original(href)?;
    if site::is_contact(&original) {
        return Some(original);
    }
    if let Some(last_segment) = original.rsplit('/').next()
        && EMAIL.is_match(last_segment)
    {
        return Some(format!("mailto:{last_segment}"));
    }
    Some(original)
}

fn is_marked(value: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| value.contains(marker))
}

fn class_contains_any(class: Option<&str>, markers: &[&str]) -> bool {
    let Some(class) = class else {
        return false;
    };
    let lowered = class.to_lowercase();
    markers.iter().any(|marker| lowered.contains(marker))
}
