//! Consumer instrumentation: the awaiting side of the readiness handshake.
//!
//! Any function that reads child internals through `this.$refs` cannot run
//! before the child has signalled readiness. This pass finds every `$refs`
//! access site, makes the nearest enclosing function `async`, and plants a
//! readiness barrier at the head of the nearest enclosing block:
//!
//! ```js
//! let promise_0 = new Promise((resolve, reject) => { this.asyncLoad = resolve; });
//! await promise_0;
//! ```
//!
//! The `asyncLoad` field the barrier assigns to is installed into the object
//! returned by `data()` so the component instance always carries it.

use oxc_allocator::{Allocator, Vec as OxcVec};
use oxc_ast::ast::*;
use oxc_ast_visit::walk_mut::{
    walk_arrow_function_expression, walk_block_statement, walk_function, walk_function_body,
    walk_program, walk_static_member_expression,
};
use oxc_ast_visit::VisitMut;
use oxc_syntax::scope::ScopeFlags;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::script;

/// Property name consumers read to reach into child components.
const REFS_PROPERTY: &str = "$refs";
/// Prefix of every barrier binding this pass synthesizes.
const BARRIER_PREFIX: &str = "promise_";

// Barrier names must be distinct across every block instrumented by this
// process, including blocks in different files.
static BARRIER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Instrument a consumer script tree in place. Returns `true` when the tree
/// was changed; re-running over already-instrumented code changes nothing.
///
/// The readiness field is installed for every consumer component, not just
/// those with an access site: the template wirer binds `asyncLoad` into every
/// `ref`-bearing element, so the field must exist whenever a binding can.
pub fn instrument_consumer<'a>(allocator: &'a Allocator, program: &mut Program<'a>) -> bool {
    let mut visitor = ConsumerVisitor {
        allocator,
        frames: Vec::new(),
        expression_body: false,
        changed: false,
    };
    walk_program(&mut visitor, program);
    let mut changed = visitor.changed;
    changed |= ensure_readiness_field(allocator, program);
    changed
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCESS-SITE VISITOR
// ═══════════════════════════════════════════════════════════════════════════════

/// One level of lexical context during traversal. `Function` frames track
/// whether an access below them demands async promotion; `Block` frames track
/// whether a barrier is owed at block exit.
enum Frame {
    Function { promote: bool },
    Block { needs_barrier: bool },
}

struct ConsumerVisitor<'a> {
    allocator: &'a Allocator,
    frames: Vec<Frame>,
    /// Set while entering the body of an expression-bodied arrow, which owns
    /// no statement block and therefore gets no `Block` frame.
    expression_body: bool,
    changed: bool,
}

impl<'a> ConsumerVisitor<'a> {
    /// Record a `$refs` access at the current position: the nearest enclosing
    /// function must become async and the nearest enclosing block owes a
    /// barrier. Top-level accesses outside any function are left alone.
    fn record_access(&mut self) {
        let mut in_function = false;
        for frame in self.frames.iter_mut().rev() {
            if let Frame::Function { promote } = frame {
                *promote = true;
                in_function = true;
                break;
            }
        }
        if !in_function {
            return;
        }
        for frame in self.frames.iter_mut().rev() {
            if let Frame::Block { needs_barrier } = frame {
                *needs_barrier = true;
                break;
            }
        }
    }

    /// Mark the nearest function frame for promotion; used when a barrier
    /// lands in a block owned by a function that had no direct access site
    /// (the expression-bodied-arrow case).
    fn promote_enclosing_function(&mut self) {
        for frame in self.frames.iter_mut().rev() {
            if let Frame::Function { promote } = frame {
                *promote = true;
                return;
            }
        }
    }

    /// Close out a block frame: if an access inside it owes a barrier and the
    /// block does not already carry one, synthesize and prepend it.
    fn finish_block(&mut self, statements: &mut OxcVec<'a, Statement<'a>>) {
        let needs_barrier = match self.frames.pop() {
            Some(Frame::Block { needs_barrier }) => needs_barrier,
            _ => return,
        };
        if !needs_barrier {
            return;
        }
        if starts_with_barrier(statements) {
            return;
        }
        let name = format!(
            "{}{}",
            BARRIER_PREFIX,
            BARRIER_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let snippet = format!(
            "let {name} = new Promise((resolve, reject) => {{ this.asyncLoad = resolve; }});\nawait {name};"
        );
        if let Some(barrier) = script::parse_statements(self.allocator, &snippet) {
            script::prepend(self.allocator, statements, barrier);
            self.promote_enclosing_function();
            self.changed = true;
        }
    }
}

/// A block whose first statement declares a `promise_`-prefixed binding was
/// instrumented by a previous run.
fn starts_with_barrier(statements: &OxcVec<Statement>) -> bool {
    match statements.first() {
        Some(Statement::VariableDeclaration(decl)) => {
            decl.declarations.iter().any(|d| match &d.id {
                BindingPattern::BindingIdentifier(id) => id.name.as_str().starts_with(BARRIER_PREFIX),
                _ => false,
            })
        }
        _ => false,
    }
}

impl<'a> VisitMut<'a> for ConsumerVisitor<'a> {
    fn visit_function(&mut self, func: &mut Function<'a>, flags: ScopeFlags) {
        self.frames.push(Frame::Function { promote: false });
        let saved = std::mem::replace(&mut self.expression_body, false);
        walk_function(self, func, flags);
        self.expression_body = saved;
        if let Some(Frame::Function { promote: true }) = self.frames.pop() {
            if !func.r#async {
                func.r#async = true;
                self.changed = true;
            }
        }
    }

    fn visit_arrow_function_expression(&mut self, arrow: &mut ArrowFunctionExpression<'a>) {
        self.frames.push(Frame::Function { promote: false });
        let saved = std::mem::replace(&mut self.expression_body, arrow.expression);
        walk_arrow_function_expression(self, arrow);
        self.expression_body = saved;
        if let Some(Frame::Function { promote: true }) = self.frames.pop() {
            if !arrow.r#async {
                arrow.r#async = true;
                self.changed = true;
            }
        }
    }

    fn visit_function_body(&mut self, body: &mut FunctionBody<'a>) {
        // An expression-bodied arrow holds a single expression statement, not
        // a block; an access inside it bubbles to the enclosing block.
        if std::mem::take(&mut self.expression_body) {
            walk_function_body(self, body);
            return;
        }
        self.frames.push(Frame::Block {
            needs_barrier: false,
        });
        walk_function_body(self, body);
        self.finish_block(&mut body.statements);
    }

    fn visit_block_statement(&mut self, block: &mut BlockStatement<'a>) {
        self.frames.push(Frame::Block {
            needs_barrier: false,
        });
        walk_block_statement(self, block);
        self.finish_block(&mut block.body);
    }

    fn visit_static_member_expression(&mut self, expr: &mut StaticMemberExpression<'a>) {
        if expr.property.name.as_str() == REFS_PROPERTY {
            self.record_access();
        }
        walk_static_member_expression(self, expr);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// READINESS FIELD
// ═══════════════════════════════════════════════════════════════════════════════

/// Make sure the object returned by `data()` carries `asyncLoad: () => {}`,
/// creating the `data` member when the component has none. Returns `true` if
/// the tree changed.
fn ensure_readiness_field<'a>(allocator: &'a Allocator, program: &mut Program<'a>) -> bool {
    let options = match script::options_object_mut(program) {
        Some(options) => options,
        None => return false,
    };
    match script::find_property_mut(options, "data") {
        Some(data) => {
            let state = match script::returned_object_mut(&mut data.value) {
                Some(state) => state,
                // A data initializer whose returned shape we cannot see is
                // left alone rather than failing the whole file.
                None => return false,
            };
            if script::has_property(state, "asyncLoad") {
                return false;
            }
            let field = script::parse_object_property(allocator, "{ asyncLoad: () => {} }");
            match field {
                Some(field) => {
                    script::prepend(allocator, &mut state.properties, vec![field]);
                    true
                }
                None => false,
            }
        }
        None => {
            let member = script::parse_object_property(
                allocator,
                "{ data() { return { asyncLoad: () => {} }; } }",
            );
            match member {
                Some(member) => {
                    script::prepend(allocator, &mut options.properties, vec![member]);
                    true
                }
                None => false,
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{parse_program, print_program, source_type_for};

    fn instrument(source: &str) -> (String, bool) {
        let allocator = Allocator::default();
        let mut program =
            parse_program(&allocator, source, source_type_for(false)).expect("parses");
        let changed = instrument_consumer(&allocator, &mut program);
        (print_program(&program), changed)
    }

    #[test]
    fn test_method_with_refs_access_gets_async_and_barrier() {
        let (code, changed) = instrument(
            "export default { methods: { focusChild() { this.$refs.child.focus(); } } };",
        );
        assert!(changed);
        assert!(code.contains("async focusChild()"));
        assert!(code.contains("new Promise((resolve, reject) => {"));
        assert!(code.contains("this.asyncLoad = resolve"));
        assert!(code.contains("await promise_"));
        // Barrier precedes the original body.
        let barrier = code.find("await promise_").expect("barrier");
        let access = code.find("this.$refs.child").expect("access");
        assert!(barrier < access);
    }

    #[test]
    fn test_readiness_field_added_to_existing_data() {
        let (code, changed) = instrument(
            "export default { data() { return { count: 0 }; }, methods: { go() { this.$refs.a.b(); } } };",
        );
        assert!(changed);
        assert!(code.contains("asyncLoad: () => {}"));
        assert!(code.contains("count: 0"));
    }

    #[test]
    fn test_data_member_created_when_absent() {
        let (code, _) =
            instrument("export default { methods: { go() { this.$refs.a.b(); } } };");
        assert!(code.contains("data()"));
        assert!(code.contains("asyncLoad: () => {}"));
    }

    #[test]
    fn test_no_refs_access_still_gets_readiness_field() {
        // Consumers carry the field even without an access site; the template
        // may bind it into a referenced child regardless.
        let (code, changed) =
            instrument("export default { methods: { go() { this.other.thing(); } } };");
        assert!(changed);
        assert!(code.contains("asyncLoad: () => {}"));
        assert!(!code.contains("await"));
        assert!(!code.contains("async "));
    }

    #[test]
    fn test_single_barrier_per_block_for_multiple_accesses() {
        let (code, _) = instrument(
            "export default { methods: { go() { this.$refs.a.x(); this.$refs.b.y(); } } };",
        );
        assert_eq!(code.matches("new Promise").count(), 1);
        assert_eq!(code.matches("await promise_").count(), 1);
    }

    #[test]
    fn test_nested_blocks_get_their_own_barrier() {
        let (code, _) = instrument(
            "export default { methods: { go(flag) { if (flag) { this.$refs.a.x(); } } } };",
        );
        // The barrier lands in the if-body, the nearest enclosing block.
        assert_eq!(code.matches("new Promise").count(), 1);
        assert!(code.contains("async go(flag)"));
        let if_pos = code.find("if (flag)").expect("if");
        let barrier = code.find("await promise_").expect("barrier");
        assert!(barrier > if_pos);
    }

    #[test]
    fn test_expression_arrow_promotes_arrow_and_encloser() {
        let (code, _) = instrument(
            "export default { methods: { go() { const f = () => this.$refs.a.x(); f(); } } };",
        );
        assert!(code.contains("async ()"));
        assert!(code.contains("async go()"));
        // The barrier lands in go's body, before the arrow declaration.
        let barrier = code.find("await promise_").expect("barrier");
        let arrow = code.find("const f").expect("arrow");
        assert!(barrier < arrow);
    }

    #[test]
    fn test_rerun_is_noop() {
        let source =
            "export default { methods: { focusChild() { this.$refs.child.focus(); } } };";
        let (first, _) = instrument(source);
        let (second, changed) = instrument(&first);
        assert!(!changed);
        assert_eq!(first, second);
    }

    #[test]
    fn test_already_async_function_not_reported_changed_for_promotion() {
        let source = "export default { methods: { async go() { this.$refs.a.x(); } } };";
        let (code, changed) = instrument(source);
        assert!(changed); // barrier + data field still inserted
        assert_eq!(code.matches("async go()").count(), 1);
    }

    #[test]
    fn test_top_level_access_is_ignored() {
        // No option object, no enclosing function: nothing to instrument.
        let (code, changed) = instrument("console.log(window.$refs);");
        assert!(!changed);
        assert!(!code.contains("await"));
        assert!(!code.contains("asyncLoad"));
    }
}
