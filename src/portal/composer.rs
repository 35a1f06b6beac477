//! Message composition: title, body, recipient-type toggles, send options.
//!
//! Field lookup follows the same cascade discipline as the navigator: a
//! specific known selector first, accessible-name or placeholder matching
//! second. Title fill is best effort (the portal sends untitled messages
//! fine); body fill is mandatory and fails composition outright when no
//! strategy lands.

use crate::message::MessageTemplate;
use crate::portal::errors::PortalError;
use crate::portal::session::PortalSession;
use crate::portal::wait::SCROLL_PAUSE;
use crate::roster::RecipientType;
use serde_json::json;
use tracing::{debug, info, warn};

/// Fills the compose form with the template and configures delivery for the
/// given recipient type. The password entered here is the per-send admin
/// confirmation, not the login credential (they happen to be the same
/// account secret on this portal).
pub async fn compose(
    session: &PortalSession,
    template: &MessageTemplate,
    recipient_type: RecipientType,
    admin_password: &str,
) -> Result<(), PortalError> {
    fill_title(session, template.title).await;
    fill_body(session, template.body).await?;
    set_recipient_types(session, recipient_type).await?;
    select_batch_send(session).await;
    fill_admin_password(session, admin_password).await?;
    info!(recipient_type = %recipient_type, "message composed");
    Ok(())
}

/// Best effort: a missing title field is logged and ignored.
async fn fill_title(session: &PortalSession, title: &str) {
    let arg = json!({ "value": title });
    match session.eval_call::<bool>(FILL_TITLE_JS, &arg).await {
        Ok(true) => debug!("title filled"),
        Ok(false) => warn!("no title field found; sending untitled"),
        Err(e) => warn!(error = %e, "title fill errored; sending untitled"),
    }
}

async fn fill_body(session: &PortalSession, body: &str) -> Result<(), PortalError> {
    let arg = json!({ "value": body });
    let filled: bool = session.eval_call(FILL_BODY_JS, &arg).await?;
    if !filled {
        return Err(PortalError::Composition(
            "no message body field found on compose page".into(),
        ));
    }
    debug!(chars = body.chars().count(), "body filled");
    Ok(())
}

/// Checks the recipient-type boxes ("학생(본인)", "어머니", ...) that sit
/// outside the address book, scoped to their container so the lookup cannot
/// collide with same-named tree categories.
async fn set_recipient_types(
    session: &PortalSession,
    recipient_type: RecipientType,
) -> Result<(), PortalError> {
    for label in recipient_type.checkbox_labels() {
        let arg = json!({ "label": label });
        let checked: bool = session.eval_call(CHECK_RECIPIENT_TYPE_JS, &arg).await?;
        if !checked {
            return Err(PortalError::Composition(format!(
                "recipient-type toggle not found: {label}"
            )));
        }
        debug!(label, "recipient-type toggle checked");
    }
    tokio::time::sleep(SCROLL_PAUSE).await;
    Ok(())
}

/// Selects the all-in-one batch send mode. Best effort: older page revisions
/// default to it and render no radio at all.
async fn select_batch_send(session: &PortalSession) {
    match session.eval::<bool>(SELECT_BATCH_SEND_JS).await {
        Ok(true) => debug!("batch send mode selected"),
        Ok(false) => debug!("no batch send radio found; assuming default mode"),
        Err(e) => warn!(error = %e, "batch send selection errored; assuming default mode"),
    }
}

async fn fill_admin_password(
    session: &PortalSession,
    password: &str,
) -> Result<(), PortalError> {
    let arg = json!({ "value": password });
    let filled: bool = session.eval_call(FILL_ADMIN_PASSWORD_JS, &arg).await?;
    if !filled {
        return Err(PortalError::Composition(
            "admin password field not found on compose page".into(),
        ));
    }
    debug!("admin password filled");
    Ok(())
}

// Synthetic input/change events are required throughout: the page framework
// only registers values it saw typed.

const FILL_TITLE_JS: &str = r#"function(arg) {
  function fill(el, value) {
    el.focus();
    el.value = value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
  }
  let el = document.querySelector('input[name="btitle"]');
  if (!el) {
    el = Array.from(document.querySelectorAll('input[type="text"]')).find(i =>
      (i.placeholder || '').includes('제목'));
  }
  if (!el) return false;
  fill(el, arg.value);
  return true;
}"#;

const FILL_BODY_JS: &str = r#"function(arg) {
  function fill(el, value) {
    el.focus();
    el.value = value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
  }
  let el = document.querySelector('textarea[name="bcontent"]');
  if (!el) el = document.querySelector('textarea');
  if (!el) return false;
  fill(el, arg.value);
  return true;
}"#;

/// Scoped to the recip_type container when present; the bare label text
/// appears in the address-book tree as well.
const CHECK_RECIPIENT_TYPE_JS: &str = r#"function(arg) {
  const scope = document.querySelector('.recip_type') || document;
  const boxes = scope.querySelectorAll('input[type="checkbox"]');
  for (const box of boxes) {
    const holder = box.closest('label') || box.parentElement;
    const text = holder ? (holder.textContent || '') : '';
    if (text.includes(arg.label)) {
      if (!box.checked) box.click();
      return true;
    }
  }
  return false;
}"#;

const SELECT_BATCH_SEND_JS: &str = r#"(function() {
  let radio = document.querySelector('#allsms');
  if (!radio) {
    for (const r of document.querySelectorAll('input[type="radio"]')) {
      const holder = r.closest('label') || r.parentElement;
      const text = holder ? (holder.textContent || '') : '';
      if (text.includes('모두') && text.includes('문자')) { radio = r; break; }
    }
  }
  if (!radio) return false;
  if (!radio.checked) radio.click();
  return true;
})()"#;

const FILL_ADMIN_PASSWORD_JS: &str = r#"function(arg) {
  function fill(el, value) {
    el.focus();
    el.value = value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
  }
  let el = document.querySelector('input[name="admin_pass"]');
  if (!el) {
    el = Array.from(document.querySelectorAll('input[type="password"]')).find(i => {
      const holder = i.closest('label') || i.parentElement;
      const text = holder ? (holder.textContent || '') : '';
      return text.includes('비밀번호') || (i.placeholder || '').includes('비밀번호');
    });
  }
  if (!el) return false;
  fill(el, arg.value);
  return true;
}"#;
