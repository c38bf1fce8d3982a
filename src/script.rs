//! Script-tree plumbing shared by the consumer and provider instrumenters.
//!
//! Wraps oxc parsing and printing of the component script block and provides
//! the structural helpers both instrumenters lean on: locating the exported
//! option object, looking up properties by key name, resolving the state
//! mapping returned by a `data` initializer, and parsing code snippets into
//! the same arena as the tree they are spliced into.

use oxc_allocator::{Allocator, TakeIn, Vec as OxcVec};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_span::SourceType;

// ═══════════════════════════════════════════════════════════════════════════════
// PARSE / PRINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Source type for a component script block.
pub fn source_type_for(typescript: bool) -> SourceType {
    let source_type = SourceType::default().with_module(true).with_jsx(true);
    if typescript {
        source_type.with_typescript(true)
    } else {
        source_type
    }
}

/// Parse script text into a program owned by `allocator`. Returns `None` on
/// any parse error; callers fall back to the unmodified source.
pub fn parse_program<'a>(
    allocator: &'a Allocator,
    source: &str,
    source_type: SourceType,
) -> Option<Program<'a>> {
    let text: &'a str = allocator.alloc_str(source);
    let ret = Parser::new(allocator, text, source_type).parse();
    if !ret.errors.is_empty() {
        return None;
    }
    Some(ret.program)
}

/// Serialize the (possibly mutated) script tree back to text.
pub fn print_program(program: &Program) -> String {
    Codegen::new().build(program).code
}

// ═══════════════════════════════════════════════════════════════════════════════
// SNIPPET PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a statement snippet into the owning arena so the resulting nodes can
/// be moved straight into the main tree. Snippets are parsed as modules so a
/// top-level `await` is accepted.
pub fn parse_statements<'a>(allocator: &'a Allocator, source: &str) -> Option<Vec<Statement<'a>>> {
    let program = parse_program(allocator, source, SourceType::default().with_module(true))?;
    Some(program.body.into_iter().collect())
}

/// Parse an object-literal snippet (`{ ... }`) and yield its properties.
pub fn parse_object_properties<'a>(
    allocator: &'a Allocator,
    source: &str,
) -> Option<Vec<ObjectPropertyKind<'a>>> {
    let ast = AstBuilder::new(allocator);
    let wrapped = format!("({})", source);
    let mut statements = parse_statements(allocator, &wrapped)?;
    if statements.is_empty() {
        return None;
    }
    let mut expression = match &mut statements[0] {
        Statement::ExpressionStatement(stmt) => stmt.expression.take_in(ast),
        _ => return None,
    };
    loop {
        match expression {
            Expression::ParenthesizedExpression(mut paren) => {
                expression = paren.expression.take_in(ast);
            }
            Expression::ObjectExpression(mut object) => {
                let properties = std::mem::replace(&mut object.properties, ast.vec());
                return Some(properties.into_iter().collect());
            }
            _ => return None,
        }
    }
}

/// Parse an object-literal snippet containing a single property.
pub fn parse_object_property<'a>(
    allocator: &'a Allocator,
    source: &str,
) -> Option<ObjectPropertyKind<'a>> {
    parse_object_properties(allocator, source)?.into_iter().next()
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTION OBJECT HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Locate the component option object: the object literal behind
/// `export default { ... }`.
pub fn options_object_mut<'a, 'b>(
    program: &'b mut Program<'a>,
) -> Option<&'b mut ObjectExpression<'a>> {
    program.body.iter_mut().find_map(|stmt| match stmt {
        Statement::ExportDefaultDeclaration(export) => match &mut export.declaration {
            ExportDefaultDeclarationKind::ObjectExpression(object) => Some(&mut **object),
            _ => None,
        },
        _ => None,
    })
}

/// Static name of a property key, if it has one.
pub fn property_key_name<'b>(key: &'b PropertyKey) -> Option<&'b str> {
    match key {
        PropertyKey::StaticIdentifier(ident) => Some(ident.name.as_str()),
        PropertyKey::StringLiteral(lit) => Some(lit.value.as_str()),
        _ => None,
    }
}

/// Find a named property of an object literal.
pub fn find_property_mut<'a, 'b>(
    object: &'b mut ObjectExpression<'a>,
    name: &str,
) -> Option<&'b mut ObjectProperty<'a>> {
    object.properties.iter_mut().find_map(|prop| match prop {
        ObjectPropertyKind::ObjectProperty(p) if property_key_name(&p.key) == Some(name) => {
            Some(&mut **p)
        }
        _ => None,
    })
}

/// Whether an object literal already declares a property of the given name.
pub fn has_property(object: &ObjectExpression, name: &str) -> bool {
    object.properties.iter().any(|prop| match prop {
        ObjectPropertyKind::ObjectProperty(p) => property_key_name(&p.key) == Some(name),
        _ => false,
    })
}

/// Resolve a property value to an object literal, looking through parentheses.
pub fn object_value_mut<'a, 'b>(
    expr: &'b mut Expression<'a>,
) -> Option<&'b mut ObjectExpression<'a>> {
    match expr {
        Expression::ObjectExpression(object) => Some(&mut **object),
        Expression::ParenthesizedExpression(paren) => object_value_mut(&mut paren.expression),
        _ => None,
    }
}

/// Resolve the state mapping returned by a `data`-style initializer. Handles
/// shorthand methods, function expressions, and arrow functions with either a
/// block body (`return { ... }`) or a bare expression body (`() => ({ ... })`).
pub fn returned_object_mut<'a, 'b>(
    initializer: &'b mut Expression<'a>,
) -> Option<&'b mut ObjectExpression<'a>> {
    match initializer {
        Expression::FunctionExpression(func) => {
            let body = func.body.as_mut()?;
            return_argument_object(&mut body.statements)
        }
        Expression::ArrowFunctionExpression(arrow) => {
            if arrow.expression {
                arrow.body.statements.iter_mut().find_map(|stmt| match stmt {
                    Statement::ExpressionStatement(es) => object_value_mut(&mut es.expression),
                    _ => None,
                })
            } else {
                return_argument_object(&mut arrow.body.statements)
            }
        }
        _ => None,
    }
}

fn return_argument_object<'a, 'b>(
    statements: &'b mut OxcVec<'a, Statement<'a>>,
) -> Option<&'b mut ObjectExpression<'a>> {
    statements.iter_mut().find_map(|stmt| match stmt {
        Statement::ReturnStatement(ret) => object_value_mut(ret.argument.as_mut()?),
        _ => None,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIST EDITING
// ═══════════════════════════════════════════════════════════════════════════════

/// Insert items at the head of an arena list, preserving the relative order of
/// everything already present. Instrumentation never reorders user members.
pub fn prepend<'a, T>(allocator: &'a Allocator, list: &mut OxcVec<'a, T>, items: Vec<T>) {
    if items.is_empty() {
        return;
    }
    let existing = std::mem::replace(list, OxcVec::new_in(allocator));
    let mut merged = OxcVec::with_capacity_in(items.len() + existing.len(), allocator);
    for item in items {
        merged.push(item);
    }
    for item in existing {
        merged.push(item);
    }
    *list = merged;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
