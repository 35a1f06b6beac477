//! Recipient address-book navigation.
//!
//! The address book is a nested, lazily-expanding tree (category →
//! subcategory → individual) with no stable identifiers, rendered inside a
//! virtualized list that only materializes visible rows. Every level is
//! located through an ordered cascade of independent strategies, each tried
//! only when the previous produced no definite success, with bounded marker
//! waits after expansion clicks and scroll-and-rescan loops at the leaf.
//!
//! A further trap: category labels ("선생님", "학생") reappear elsewhere on
//! the page as recipient-type toggles annotated "(본인)". Every tree lookup
//! excludes that suffix to stay inside the address book.

use crate::config::Config;
use crate::portal::errors::PortalError;
use crate::portal::session::PortalSession;
use crate::portal::wait::{
    self, ADDRESS_BOOK_TIMEOUT, SCROLL_PAUSE, SCROLL_RETRIES, TREE_EXPAND_TIMEOUT, poll_until,
};
use crate::roster::{RecipientSpec, StudentId};
use serde_json::json;
use tracing::{debug, info, warn};

/// Navigates from the post-login landing page to the message compose page.
///
/// Menu clicks first (direct URL navigation has been observed to be blocked
/// for some accounts), direct URL as fallback, then a bounded wait for the
/// address book to populate.
pub async fn open_compose_page(
    session: &PortalSession,
    config: &Config,
) -> Result<(), PortalError> {
    for menu_label in ["알림문자", "문자 발송"] {
        let clicked: bool = session
            .eval_call(CLICK_TEXT_JS, &json!({ "text": menu_label }))
            .await
            .unwrap_or(false);
        debug!(menu = menu_label, clicked, "menu navigation");
        tokio::time::sleep(wait::SETTLE_DELAY).await;
    }

    let url = session.current_url().await?;
    if !url.contains("sms.php") {
        debug!(%url, "menu navigation did not reach compose page, using direct URL");
        session
            .goto(&format!("{}/sms.php?action=send", config.portal_base_url))
            .await?;
        tokio::time::sleep(wait::SETTLE_DELAY).await;
    }

    // The address book loads asynchronously; a populated book shows one
    // checkbox per category plus recipient-type toggles.
    let ready = poll_until(ADDRESS_BOOK_TIMEOUT, || async move {
        let count: u64 = session
            .eval("document.querySelectorAll('input[type=\"checkbox\"]').length")
            .await?;
        Ok::<_, PortalError>(count > 5)
    })
    .await?;

    if !ready {
        let visible = visible_items(session).await?;
        warn!(?visible, "address book did not populate within budget; continuing");
    }
    let url = session.current_url().await?;
    info!(url = %url, "compose page open");
    Ok(())
}

/// Unchecks every currently checked checkbox on the page.
///
/// Must run before each batch iteration: the portal retains checkbox state
/// across DOM interactions within one page load, so selections would
/// otherwise accumulate across recipients.
pub async fn clear_selections(session: &PortalSession) -> Result<u64, PortalError> {
    let cleared: u64 = session.eval(CLEAR_CHECKED_JS).await?;
    if cleared > 0 {
        debug!(cleared, "cleared stale selections");
    }
    tokio::time::sleep(SCROLL_PAUSE).await;
    Ok(cleared)
}

/// Locates and checks the selection box for one recipient.
pub async fn select_recipient(
    session: &PortalSession,
    recipient: &RecipientSpec,
) -> Result<(), PortalError> {
    match recipient {
        RecipientSpec::Staff { display_name } => select_staff(session, display_name).await,
        RecipientSpec::Student(student) => {
            let id = StudentId::parse(&student.student_id).map_err(|e| {
                PortalError::RecipientNotFound {
                    name: student.name.clone(),
                    visible: vec![e.to_string()],
                }
            })?;
            select_student(session, &student.name, &id).await
        }
    }
}

/// Staff lookup: expand the staff category, then the duty-staff subcategory,
/// then check the named individual's box.
async fn select_staff(session: &PortalSession, display_name: &str) -> Result<(), PortalError> {
    expand_category(session, "선생님", Some("업무담당자")).await?;
    expand_category(session, "업무담당자", Some(display_name)).await?;

    if !select_leaf_by_text(session, display_name).await? {
        return Err(not_found(session, display_name).await);
    }
    info!(recipient = display_name, "staff recipient selected");
    Ok(())
}

/// Student lookup: students category → grade node → class node → leaf scan
/// over all text nodes for the name or roll-number suffix.
async fn select_student(
    session: &PortalSession,
    name: &str,
    id: &StudentId,
) -> Result<(), PortalError> {
    let grade_label = format!("{}학년", id.grade);
    let class_label = format!("{}반", id.class_code);

    expand_category(session, "학생", Some(&grade_label)).await?;
    expand_category(session, &grade_label, Some(&class_label)).await?;
    expand_category(session, &class_label, None).await?;

    // The leaf rendering nests text arbitrarily, so scan every text node
    // rather than only list-item text.
    let roll_label = format!("{}번", id.roll_number);
    let arg = json!({ "name": name, "roll": roll_label });

    let mut found = false;
    for pass in 0..SCROLL_RETRIES {
        found = session.eval_call(SELECT_STUDENT_LEAF_JS, &arg).await?;
        if found {
            break;
        }
        debug!(pass, recipient = name, "student not visible yet, scrolling");
        scroll_lists(session).await?;
    }

    if !found {
        return Err(not_found(session, name).await);
    }
    info!(recipient = name, grade = id.grade, class = %id.class_code, "student recipient selected");
    Ok(())
}

/// Expands one tree level through a three-tier locator cascade, then waits
/// (bounded, non-fatally) for `marker` to confirm the expansion took.
async fn expand_category(
    session: &PortalSession,
    label: &str,
    marker: Option<&str>,
) -> Result<(), PortalError> {
    let arg = json!({ "label": label });

    // Ordered strategy chain; each tier runs only if the previous one found
    // nothing definite.
    let tiers: [(&str, &str); 3] = [
        ("list-item scan", EXPAND_BY_LI_SCAN_JS),
        ("checkbox-parent scan", EXPAND_BY_CHECKBOX_JS),
        ("combined selector", EXPAND_BY_SELECTOR_JS),
    ];

    let mut expanded = false;
    for (tier, js) in tiers {
        expanded = session.eval_call(js, &arg).await.unwrap_or(false);
        if expanded {
            debug!(label, tier, "category expanded");
            break;
        }
    }
    if !expanded {
        return Err(not_found(session, label).await);
    }

    if let Some(marker) = marker {
        let marker_arg = json!({ "text": marker });
        let appeared = poll_until(TREE_EXPAND_TIMEOUT, || {
            let marker_arg = marker_arg.clone();
            async move {
                session
                    .eval_call::<bool>(PAGE_CONTAINS_TEXT_JS, &marker_arg)
                    .await
            }
        })
        .await?;
        if !appeared {
            // Degraded but not fatal: some expansions render without the
            // expected marker; the leaf scan will make the final call.
            warn!(label, marker, "expansion marker never appeared; proceeding");
        }
    } else {
        tokio::time::sleep(SCROLL_PAUSE).await;
    }
    Ok(())
}

/// Checks the box inside the first list item containing `text`, rescanning
/// after programmatic scrolls to defeat list virtualization.
async fn select_leaf_by_text(session: &PortalSession, text: &str) -> Result<bool, PortalError> {
    let arg = json!({ "text": text });
    for pass in 0..SCROLL_RETRIES {
        let found: bool = session.eval_call(SELECT_LEAF_JS, &arg).await?;
        if found {
            return Ok(true);
        }
        debug!(pass, text, "leaf not visible yet, scrolling");
        scroll_lists(session).await?;
    }
    Ok(false)
}

/// Scrolls every vertically overflowing list container by a fixed increment.
async fn scroll_lists(session: &PortalSession) -> Result<(), PortalError> {
    session.eval::<bool>(SCROLL_LISTS_JS).await?;
    tokio::time::sleep(SCROLL_PAUSE).await;
    Ok(())
}

/// Builds the terminal per-recipient error with a truncated dump of the
/// currently visible items for offline diagnosis.
async fn not_found(session: &PortalSession, name: &str) -> PortalError {
    let visible = visible_items(session).await.unwrap_or_default();
    PortalError::RecipientNotFound {
        name: name.to_string(),
        visible,
    }
}

async fn visible_items(session: &PortalSession) -> Result<Vec<String>, PortalError> {
    session.eval(VISIBLE_ITEMS_JS).await
}

/// Tier 1: enumerate all list items, click the first whose text contains the
/// label but not the self-referential "(본인)" recipient-type variant.
const EXPAND_BY_LI_SCAN_JS: &str = r#"function(arg) {
  const items = Array.from(document.querySelectorAll('li'));
  for (const li of items) {
    const text = li.textContent || '';
    if (text.includes(arg.label) && !text.includes(arg.label + '(본인)')) {
      li.click();
      return true;
    }
  }
  return false;
}"#;

/// Tier 2: restrict to list items that carry a checkbox (address-book rows
/// always do) before matching the label.
const EXPAND_BY_CHECKBOX_JS: &str = r#"function(arg) {
  const boxes = document.querySelectorAll('input[type="checkbox"]');
  for (const box of boxes) {
    const li = box.closest('li');
    if (!li) continue;
    const text = li.textContent || '';
    if (text.includes(arg.label) && !text.includes(arg.label + '(본인)')) {
      li.click();
      return true;
    }
  }
  return false;
}"#;

/// Tier 3: one combined structural selector as a last resort.
const EXPAND_BY_SELECTOR_JS: &str = r#"function(arg) {
  const items = document.querySelectorAll('ul li');
  for (const li of items) {
    if (!li.querySelector('input[type="checkbox"]')) continue;
    const text = (li.textContent || '').trim();
    if (text.startsWith(arg.label) && !text.includes('(본인)')) {
      li.click();
      return true;
    }
  }
  return false;
}"#;

const PAGE_CONTAINS_TEXT_JS: &str = r#"function(arg) {
  return (document.body.innerText || '').includes(arg.text);
}"#;

const CLICK_TEXT_JS: &str = r#"function(arg) {
  const candidates = Array.from(document.querySelectorAll('a, button, span, li'));
  for (const el of candidates) {
    const text = (el.textContent || '').trim();
    if (text === arg.text || text.startsWith(arg.text)) {
      el.click();
      return true;
    }
  }
  return false;
}"#;

const CLEAR_CHECKED_JS: &str = r#"(function() {
  const checked = document.querySelectorAll('input[type="checkbox"]:checked');
  checked.forEach(box => box.click());
  return checked.length;
})()"#;

/// Leaf select by contained text: click the checkbox inside the matching
/// list item, skipping already-checked boxes.
const SELECT_LEAF_JS: &str = r#"function(arg) {
  const items = Array.from(document.querySelectorAll('ul li'));
  for (const li of items) {
    const text = li.textContent || '';
    if (!text.includes(arg.text)) continue;
    const box = li.querySelector('input[type="checkbox"]');
    if (box) {
      if (!box.checked) box.click();
      return true;
    }
  }
  return false;
}"#;

/// Student leaf scan over all text nodes; the nearest enclosing list item
/// owns the selection checkbox.
const SELECT_STUDENT_LEAF_JS: &str = r#"function(arg) {
  const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT);
  while (walker.nextNode()) {
    const text = walker.currentNode.textContent || '';
    if (!text.includes(arg.name) && !text.includes(arg.roll)) continue;
    const parent = walker.currentNode.parentElement;
    if (!parent) continue;
    const li = parent.closest('li');
    if (!li) continue;
    const box = li.querySelector('input[type="checkbox"]');
    if (box) {
      if (!box.checked) box.click();
      return true;
    }
  }
  return false;
}"#;

const SCROLL_LISTS_JS: &str = r#"(function() {
  let scrolled = false;
  for (const list of document.querySelectorAll('ul')) {
    if (list.scrollHeight > list.clientHeight) {
      list.scrollTop += 300;
      scrolled = true;
    }
  }
  return scrolled;
})()"#;

const VISIBLE_ITEMS_JS: &str = r#"(function() {
  return Array.from(document.querySelectorAll('ul li'))
    .slice(0, 20)
    .map(li => (li.textContent || '').trim().substring(0, 50));
})()"#;
