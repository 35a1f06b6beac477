//! Portal authentication.
//!
//! The login page has no stable markup, so the identifier and password
//! inputs are located by accessible name (label text, aria-label,
//! placeholder) first and by position/type as a fallback. The portal returns
//! no structured login result; success is inferred by the caller continuing
//! past this step.

use crate::config::Config;
use crate::portal::errors::PortalError;
use crate::portal::session::PortalSession;
use crate::portal::wait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Fills the login form and submits it.
///
/// Fails with [`PortalError::Auth`] when no recognizable login form exists
/// after navigation; that is fatal to the whole run.
pub async fn login(session: &PortalSession, config: &Config) -> Result<(), PortalError> {
    let login_url = format!("{}/user.php?action=signin", config.portal_base_url);
    session.goto(&login_url).await?;
    tokio::time::sleep(wait::SETTLE_DELAY).await;

    let url = session.current_url().await?;
    debug!(url = %url, "login page loaded");

    let creds = json!({
        "id": config.portal_id,
        "password": config.portal_password(),
    });

    let outcome: Value = session.eval_call(FILL_LOGIN_FORM_JS, &creds).await?;
    let filled = outcome["ok"].as_bool().unwrap_or(false);
    let strategy = outcome["strategy"].as_str().unwrap_or("none");
    if !filled {
        let detail = outcome["error"].as_str().unwrap_or("login form not found");
        return Err(PortalError::Auth(detail.to_string()));
    }
    debug!(strategy, "login form filled");

    let submitted: bool = session.eval(CLICK_LOGIN_BUTTON_JS).await?;
    if !submitted {
        return Err(PortalError::Auth("login button not found".to_string()));
    }

    // Give the post-login redirect time to land; the portal emits no signal.
    tokio::time::sleep(wait::SETTLE_DELAY).await;
    tokio::time::sleep(wait::SETTLE_DELAY).await;

    let url = session.current_url().await?;
    if url.contains("action=signin") {
        warn!(%url, "still on signin page after submit; credentials may be rejected");
    }
    info!(%url, "login submitted");
    Ok(())
}

/// Locates the id/password inputs by accessible name, scoring label text,
/// aria-label and placeholder; falls back to the first visible text and
/// password inputs. Returns `{ok, strategy}` or `{ok: false, error}`.
const FILL_LOGIN_FORM_JS: &str = r#"function(creds) {
  function visible(el) {
    if (!el || !el.getBoundingClientRect) return false;
    const r = el.getBoundingClientRect();
    return r.width > 0 && r.height > 0;
  }
  function accessibleName(el) {
    const aria = el.getAttribute('aria-label') || '';
    const ph = el.getAttribute('placeholder') || '';
    if (aria || ph) return aria + ' ' + ph;
    if (el.id) {
      const label = document.querySelector('label[for="' + el.id + '"]');
      if (label) return label.textContent || '';
    }
    return el.name || '';
  }
  function fill(el, value) {
    try { el.focus(); } catch (_) {}
    el.value = value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
  }

  const inputs = Array.from(document.querySelectorAll('input')).filter(visible);
  let idInput = null;
  let pwInput = null;
  for (const el of inputs) {
    const name = accessibleName(el);
    if (!idInput && (name.includes('아이디') || name.includes('이메일'))) idInput = el;
    if (!pwInput && name.includes('비밀번호') && el.type === 'password') pwInput = el;
  }

  if (idInput && pwInput) {
    fill(idInput, creds.id);
    fill(pwInput, creds.password);
    return { ok: true, strategy: 'accessible-name' };
  }

  const textInput = inputs.find(el => el.type === 'text' || el.type === 'email');
  const passwordInput = inputs.find(el => el.type === 'password');
  if (!textInput || !passwordInput) {
    return { ok: false, error: 'no visible id/password inputs on page' };
  }
  fill(textInput, creds.id);
  fill(passwordInput, creds.password);
  return { ok: true, strategy: 'positional' };
}"#;

/// Clicks the button whose text matches the localized login label, falling
/// back to the first submit control.
const CLICK_LOGIN_BUTTON_JS: &str = r#"(function() {
  const candidates = Array.from(
    document.querySelectorAll('button, input[type="submit"], a[role="button"]')
  );
  for (const el of candidates) {
    const text = (el.textContent || el.value || '').trim();
    if (text.includes('로그인')) {
      el.click();
      return true;
    }
  }
  const submit = document.querySelector('input[type="submit"], button[type="submit"]');
  if (submit) {
    submit.click();
    return true;
  }
  return false;
})()"#;
