//! Provider instrumentation: the signalling side of the readiness handshake.
//!
//! A child component whose internals are read by a parent receives the
//! resolver contract: an `asyncLoadProp` function prop the parent binds its
//! barrier resolver to, a watcher that invokes a late-arriving resolver, and
//! a mounted hook that fires the resolver once the child is live:
//!
//! ```js
//! props: { asyncLoadProp: { type: Function, default: () => {} } },
//! watch: { asyncLoadProp: { handler(val) { val(); } } },
//! mounted() { this.asyncLoadProp && this.asyncLoadProp(); }
//! ```
//!
//! Every insertion is guarded by a structural presence check, so running the
//! pass twice leaves the tree exactly as one run left it. Injected members are
//! prepended; user members keep their relative order.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_syntax::operator::LogicalOperator;

use crate::script;

/// Name of the resolver prop the parent binds into.
const CAPABILITY_PROP: &str = "asyncLoadProp";

const PROP_ENTRY: &str = "{ asyncLoadProp: { type: Function, default: () => {} } }";
const PROPS_MEMBER: &str = "{ props: { asyncLoadProp: { type: Function, default: () => {} } } }";
const WATCH_ENTRY: &str = "{ asyncLoadProp: { handler(val) { val(); } } }";
const WATCH_MEMBER: &str = "{ watch: { asyncLoadProp: { handler(val) { val(); } } } }";
const MOUNTED_STATEMENT: &str = "this.asyncLoadProp && this.asyncLoadProp();";
const MOUNTED_MEMBER: &str = "{ mounted() { this.asyncLoadProp && this.asyncLoadProp(); } }";

/// Instrument a provider script tree in place. Returns `true` when the tree
/// was changed. Components without an `export default { ... }` option object
/// are left untouched.
pub fn instrument_provider<'a>(allocator: &'a Allocator, program: &mut Program<'a>) -> bool {
    let options = match script::options_object_mut(program) {
        Some(options) => options,
        None => return false,
    };
    let mut changed = ensure_capability_prop(allocator, options);
    changed |= ensure_watch_entry(allocator, options);
    changed |= ensure_mounted_invocation(allocator, options);
    changed
}

// ═══════════════════════════════════════════════════════════════════════════════
// MEMBER INSERTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Add the `asyncLoadProp` declaration to `props`, creating `props` when the
/// component declares none. Array-form `props` are left alone since they
/// cannot carry a default.
fn ensure_capability_prop<'a>(allocator: &'a Allocator, options: &mut ObjectExpression<'a>) -> bool {
    match script::find_property_mut(options, "props") {
        Some(props) => match script::object_value_mut(&mut props.value) {
            Some(mapping) => {
                if script::has_property(mapping, CAPABILITY_PROP) {
                    return false;
                }
                insert_property(allocator, mapping, PROP_ENTRY)
            }
            None => false,
        },
        None => insert_property(allocator, options, PROPS_MEMBER),
    }
}

/// Add the resolver watcher, creating `watch` when absent.
fn ensure_watch_entry<'a>(allocator: &'a Allocator, options: &mut ObjectExpression<'a>) -> bool {
    match script::find_property_mut(options, "watch") {
        Some(watch) => match script::object_value_mut(&mut watch.value) {
            Some(mapping) => {
                if script::has_property(mapping, CAPABILITY_PROP) {
                    return false;
                }
                insert_property(allocator, mapping, WATCH_ENTRY)
            }
            None => false,
        },
        None => insert_property(allocator, options, WATCH_MEMBER),
    }
}

/// Make `this.asyncLoadProp && this.asyncLoadProp();` the first mounted
/// statement, creating the hook when absent.
fn ensure_mounted_invocation<'a>(
    allocator: &'a Allocator,
    options: &mut ObjectExpression<'a>,
) -> bool {
    let mounted = match script::find_property_mut(options, "mounted") {
        Some(mounted) => mounted,
        None => return insert_property(allocator, options, MOUNTED_MEMBER),
    };
    let statements = match &mut mounted.value {
        Expression::FunctionExpression(func) => match func.body.as_mut() {
            Some(body) => &mut body.statements,
            None => return false,
        },
        Expression::ArrowFunctionExpression(arrow) if !arrow.expression => {
            &mut arrow.body.statements
        }
        _ => return false,
    };
    if statements.iter().any(invokes_capability) {
        return false;
    }
    match script::parse_statements(allocator, MOUNTED_STATEMENT) {
        Some(invocation) => {
            script::prepend(allocator, statements, invocation);
            true
        }
        None => false,
    }
}

fn insert_property<'a>(
    allocator: &'a Allocator,
    object: &mut ObjectExpression<'a>,
    snippet: &str,
) -> bool {
    match script::parse_object_property(allocator, snippet) {
        Some(member) => {
            script::prepend(allocator, &mut object.properties, vec![member]);
            true
        }
        None => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRUCTURAL DETECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Whether a statement is the resolver invocation
/// `this.asyncLoadProp && this.asyncLoadProp()` from a previous run.
fn invokes_capability(stmt: &Statement) -> bool {
    let expr = match stmt {
        Statement::ExpressionStatement(es) => &es.expression,
        _ => return false,
    };
    let logical = match expr {
        Expression::LogicalExpression(logical) => logical,
        _ => return false,
    };
    if logical.operator != LogicalOperator::And {
        return false;
    }
    let right_invokes = match &logical.right {
        Expression::CallExpression(call) => is_capability_member(&call.callee),
        _ => false,
    };
    is_capability_member(&logical.left) && right_invokes
}

fn is_capability_member(expr: &Expression) -> bool {
    match expr {
        Expression::StaticMemberExpression(member) => {
            member.property.name.as_str() == CAPABILITY_PROP
                && matches!(member.object, Expression::ThisExpression(_))
        }
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
