//! Guest agent script tests
//!
//! Evaluates the rendered JavaScript agent in an embedded QuickJS engine
//! against a minimal stub document, so the script that actually ships into
//! the sandbox is exercised, not just inspected.

use a3s_conversation::agent::{send_text_call, AGENT_GLOBAL, STYLE_ELEMENT_ID};
use a3s_conversation::{script_literal, AgentConfig, AgentScript, AVATAR_READY_MESSAGE};
use rquickjs::{Context, Runtime};
use serde_json::Value;

/// Just enough of `window`/`document` for the agent to run
const PAGE: &str = r#"
var window = globalThis;
var console = { warn: function () {}, log: function () {} };
var posted = [];
window.ReactNativeWebView = { postMessage: function (m) { posted.push(m); } };

var intervals = [];
function setInterval(fn, ms) { intervals.push(fn); return intervals.length; }
function tick() { intervals.forEach(function (f) { f(); }); }

var observers = [];
function MutationObserver(cb) { this.cb = cb; observers.push(this); }
MutationObserver.prototype.observe = function () {};
function mutate() { observers.forEach(function (o) { o.cb([]); }); }

function Event(type) { this.type = type; }
function KeyboardEvent(type, init) { this.type = type; this.key = init.key; }

function matches(e, sel) {
  return sel.split(',').some(function (p) {
    p = p.trim();
    if (p === '[role="button"]') { return e.attrs.role === 'button'; }
    if (p === 'input[type="text"]') { return e.tag === 'input' && e.attrs.type === 'text'; }
    if (p === 'input:not([type])') { return e.tag === 'input' && !e.hasAttribute('type'); }
    return e.tag === p;
  });
}

var El = class {
  constructor(tag, text, attrs) {
    this.tag = tag;
    this.text = text || '';
    this.attrs = attrs || {};
    this.children = [];
    this.clicks = 0;
    this.events = [];
    var style = { display: '' };
    style.setProperty = function (k, v) { style[k] = v; };
    this.style = style;
  }
  get tagName() { return this.tag.toUpperCase(); }
  get id() { return this.attrs.id; }
  set id(v) { this.attrs.id = v; }
  get textContent() {
    return this.text + this.children.map(function (c) { return c.textContent; }).join('');
  }
  set textContent(v) { this.text = v; this.children = []; }
  getAttribute(n) { return this.hasAttribute(n) ? this.attrs[n] : null; }
  hasAttribute(n) { return Object.prototype.hasOwnProperty.call(this.attrs, n); }
  appendChild(c) { this.children.push(c); return c; }
  click() { this.clicks++; }
  focus() {}
  dispatchEvent(e) { this.events.push(e.type); return true; }
  descendants() {
    var out = [];
    (function walk(n) { n.children.forEach(function (c) { out.push(c); walk(c); }); })(this);
    return out;
  }
  querySelectorAll(sel) { return this.descendants().filter(function (e) { return matches(e, sel); }); }
  querySelector(sel) { return this.querySelectorAll(sel)[0] || null; }
};
var HTMLInputElement = class extends El {
  get value() { return this._value || ''; }
  set value(v) { this._value = v; }
};
var HTMLTextAreaElement = class extends El {
  get value() { return this._value || ''; }
  set value(v) { this._value = v; }
};

function el(tag, text, attrs) {
  var C = tag === 'textarea' ? HTMLTextAreaElement : tag === 'input' ? HTMLInputElement : El;
  return new C(tag, text, attrs);
}

var html = el('html');
var head = html.appendChild(el('head'));
var body = html.appendChild(el('body'));
var document = {
  readyState: 'complete',
  documentElement: html,
  head: head,
  body: body,
  querySelectorAll: function (s) { return html.querySelectorAll(s); },
  querySelector: function (s) { return html.querySelector(s); },
  getElementById: function (id) {
    return html.descendants().filter(function (e) { return e.attrs.id === id; })[0] || null;
  },
  createElement: function (tag) { return el(tag); }
};
"#;

/// Build the page, install the agent, apply `calls`, then evaluate `report`
/// (which must produce a JSON string)
fn run_page(setup: &str, calls: &[String], report: &str) -> Value {
    let runtime = Runtime::new().unwrap();
    let context = Context::full(&runtime).unwrap();
    let agent = AgentScript::render(&AgentConfig::default()).unwrap();

    context.with(|ctx| {
        let prelude = format!(
            "{}\nvar AGENT = {};\nvar STYLE = {};\n{}\ntrue;",
            PAGE,
            script_literal(AGENT_GLOBAL),
            script_literal(STYLE_ELEMENT_ID),
            setup
        );
        let _: bool = ctx.eval(prelude).unwrap();

        let installed: bool = ctx.eval(agent.source()).unwrap();
        assert!(installed);

        for call in calls {
            let _: bool = ctx.eval(call.as_str()).unwrap();
        }

        let json: String = ctx.eval(report).unwrap();
        serde_json::from_str(&json).unwrap()
    })
}

// ─── Join & Readiness ────────────────────────────────────────────

const LOBBY: &str = r#"
var waiting = body.appendChild(el('div', 'Waiting for others to join'));
var join = body.appendChild(el('button', 'Join now'));
var stage = body.appendChild(el('div'));
"#;

#[test]
fn test_script_joins_once_and_reports_ready_once() {
    let report = r#"
tick(); tick();
var clicksBeforeVideo = join.clicks;

stage.appendChild(el('video', '', { 'data-local': '' }));
mutate(); tick();
var postedAfterSelfView = posted.length;

stage.appendChild(el('video'));
mutate(); tick(); tick(); mutate();

JSON.stringify({
  clicks: join.clicks,
  clicksBeforeVideo: clicksBeforeVideo,
  postedAfterSelfView: postedAfterSelfView,
  posted: posted,
  state: window[AGENT].state()
})
"#;
    let result = run_page(LOBBY, &[], report);

    assert_eq!(result["clicksBeforeVideo"], 1);
    assert_eq!(result["clicks"], 1);
    assert_eq!(result["postedAfterSelfView"], 0);
    assert_eq!(result["posted"], serde_json::json!([AVATAR_READY_MESSAGE]));
    assert_eq!(result["state"]["joined"], true);
    assert_eq!(result["state"]["avatarReady"], true);
}

#[test]
fn test_script_hides_chrome_but_not_video_containers() {
    let report = r#"
stage.appendChild(el('video'));
mutate();
JSON.stringify({
  waitingHidden: waiting.style.display === 'none',
  stageHidden: stage.style.display === 'none',
  styleInstalled: document.getElementById(STYLE) !== null
})
"#;
    let result = run_page(LOBBY, &[], report);

    assert_eq!(result["waitingHidden"], true);
    assert_eq!(result["stageHidden"], false);
    assert_eq!(result["styleInstalled"], true);
}

#[test]
fn test_script_waits_for_ready_document() {
    let setup = format!("{}\ndocument.readyState = 'loading';", LOBBY);
    let report = r#"
tick();
var clicksWhileLoading = join.clicks;
document.readyState = 'complete';
tick();
JSON.stringify({ clicksWhileLoading: clicksWhileLoading, clicks: join.clicks })
"#;
    let result = run_page(&setup, &[], report);

    assert_eq!(result["clicksWhileLoading"], 0);
    assert_eq!(result["clicks"], 1);
}

// ─── Text Delivery ───────────────────────────────────────────────

#[test]
fn test_send_text_call_sets_exact_value_and_clicks_send() {
    let text = "hello `world` \\ok";
    let setup = r#"
var input = body.appendChild(el('textarea'));
var send = body.appendChild(el('button', 'Send'));
"#;
    let report = r#"
JSON.stringify({ value: input.value, sendClicks: send.clicks, events: input.events })
"#;
    let result = run_page(setup, &[send_text_call(text)], report);

    assert_eq!(result["value"], text);
    assert_eq!(result["sendClicks"], 1);
    assert_eq!(result["events"], serde_json::json!(["input", "change"]));
}

#[test]
fn test_send_text_call_without_send_control_presses_enter() {
    let text = "line\u{2028}sep </script><b>\"quoted\"</b> ${x}";
    let setup = "var input = body.appendChild(el('input'));";
    let report = "JSON.stringify({ value: input.value, events: input.events })";
    let result = run_page(setup, &[send_text_call(text)], report);

    assert_eq!(result["value"], text);
    assert_eq!(
        result["events"],
        serde_json::json!(["input", "change", "keydown", "keypress", "keyup"])
    );
}

#[test]
fn test_send_text_call_before_agent_is_noop() {
    let runtime = Runtime::new().unwrap();
    let context = Context::full(&runtime).unwrap();
    context.with(|ctx| {
        let _: bool = ctx.eval(format!("{}\ntrue;", PAGE)).unwrap();
        let done: bool = ctx.eval(send_text_call("hi")).unwrap();
        assert!(done);
    });
}
