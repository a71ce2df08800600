//! Indented text dumps of SQM trees for diagnostics.

use std::fmt::Write;

use super::expr::{SqmCaseBranches, SqmExpr, SqmLiteral, SqmPredicate};
use super::from::{JoinTarget, RootSource, SqmJoin, SqmRoot};
use super::select::{QueryPart, QuerySpec, SelectStatement, Selectable, Selection};

#[derive(Debug, Default)]
pub struct SqmTreePrinter {
    out: String,
    depth: usize,
}

impl SqmTreePrinter {
    pub fn print(statement: &SelectStatement) -> String {
        let mut printer = Self::default();
        printer.line(&format!(
            "select-statement {} ({:?}, {:?})",
            statement.id, statement.source, statement.result_type
        ));
        printer.nested(|p| {
            for (name, cte) in &statement.ctes {
                p.line(&format!("cte {name}"));
                p.nested(|p| p.query_part(cte));
            }
            p.query_part(&statement.query_part);
        });
        printer.out
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{:indent$}{text}", "", indent = self.depth * 2);
    }

    fn nested(&mut self, body: impl FnOnce(&mut Self)) {
        self.depth += 1;
        body(self);
        self.depth -= 1;
    }

    fn query_part(&mut self, part: &QueryPart) {
        match part {
            QueryPart::Spec(spec) => self.query_spec(spec),
            QueryPart::Group(group) => {
                let all = if group.all { " all" } else { "" };
                self.line(&format!("query-group {}{all}", group.operator.name()));
                self.nested(|p| {
                    for part in &group.parts {
                        p.query_part(part);
                    }
                    for sort in &group.order_by {
                        p.line(&format!("order-by {:?}", sort.direction));
                        p.nested(|p| p.expr(&sort.expr));
                    }
                });
            }
        }
    }

    fn query_spec(&mut self, spec: &QuerySpec) {
        self.line("query-spec");
        self.nested(|p| {
            let distinct = if spec.select.distinct { " distinct" } else { "" };
            p.line(&format!("select{distinct}"));
            p.nested(|p| spec.select.selections.iter().for_each(|s| p.selection(s)));

            p.line("from");
            p.nested(|p| spec.roots.iter().for_each(|r| p.root(r)));

            if let Some(predicate) = &spec.where_clause {
                p.line("where");
                p.nested(|p| p.predicate(predicate));
            }
            if !spec.group_by.is_empty() {
                p.line("group-by");
                p.nested(|p| spec.group_by.iter().for_each(|e| p.expr(e)));
            }
            if let Some(predicate) = &spec.having {
                p.line("having");
                p.nested(|p| p.predicate(predicate));
            }
            for sort in &spec.order_by {
                p.line(&format!("order-by {:?}", sort.direction));
                p.nested(|p| p.expr(&sort.expr));
            }
            if let Some(offset) = &spec.offset {
                p.line("offset");
                p.nested(|p| p.expr(offset));
            }
            if let Some(fetch) = &spec.fetch {
                p.line("fetch");
                p.nested(|p| p.expr(&fetch.count));
            }
        });
    }

    fn selection(&mut self, selection: &Selection) {
        let alias = selection
            .alias
            .as_deref()
            .map(|a| format!(" as {a}"))
            .unwrap_or_default();
        match &selection.item {
            Selectable::Expr(expr) => {
                self.line(&format!("selection{alias}"));
                self.nested(|p| p.expr(expr));
            }
            Selectable::Tuple(items) => {
                self.line(&format!("tuple{alias}"));
                self.nested(|p| items.iter().for_each(|s| p.selection(s)));
            }
            Selectable::Instantiation { class, arguments } => {
                self.line(&format!("new {class}{alias}"));
                self.nested(|p| arguments.iter().for_each(|s| p.selection(s)));
            }
        }
    }

    fn root(&mut self, root: &SqmRoot) {
        let alias = root.alias.as_deref().unwrap_or("-");
        match &root.source {
            RootSource::Entity(name) => self.line(&format!("root {} {name} {alias}", root.id)),
            RootSource::Cte { name, .. } => self.line(&format!("root {} cte {name} {alias}", root.id)),
            RootSource::Derived { query, .. } => {
                self.line(&format!("root {} derived {alias}", root.id));
                self.nested(|p| p.query_part(query));
            }
        }
        self.nested(|p| root.joins.iter().for_each(|j| p.join(j)));
    }

    fn join(&mut self, join: &SqmJoin) {
        let mut flags = String::new();
        if join.fetch {
            flags.push_str(" fetch");
        }
        if join.implicit {
            flags.push_str(" implicit");
        }
        let target = match &join.target {
            JoinTarget::Attribute { attribute, .. } => attribute.clone(),
            JoinTarget::Entity(entity) => entity.clone(),
            JoinTarget::Derived { .. } => "derived".to_string(),
        };
        self.line(&format!(
            "join {} {} {target}{flags}",
            join.id,
            join.kind.name()
        ));
        self.nested(|p| {
            if let JoinTarget::Derived { query, .. } = &join.target {
                p.query_part(query);
            }
            if let Some(condition) = &join.condition {
                p.line("on");
                p.nested(|p| p.predicate(condition));
            }
            join.joins.iter().for_each(|j| p.join(j));
        });
    }

    fn expr(&mut self, expr: &SqmExpr) {
        match expr {
            SqmExpr::Literal(literal) => self.line(&format!("literal {}", literal_text(literal))),
            SqmExpr::Parameter(parameter) => {
                self.line(&format!("parameter {} {} : {}", parameter.id, parameter.label(), parameter.ty))
            }
            SqmExpr::Path(path) => self.line(&format!(
                "path {}.{} : {}",
                path.source,
                path.attribute.as_deref().unwrap_or("*"),
                path.ty
            )),
            SqmExpr::Function(function) => {
                let distinct = if function.distinct { " distinct" } else { "" };
                self.line(&format!("function {}{distinct} : {}", function.name, function.ty));
                self.nested(|p| function.arguments.iter().for_each(|a| p.expr(a)));
            }
            SqmExpr::Unit(unit) => self.line(&format!("unit {unit}")),
            SqmExpr::CastTarget(target) => self.line(&format!("type {}", target.ty)),
            SqmExpr::Star => self.line("*"),
            SqmExpr::Arithmetic {
                op,
                left,
                right,
                ty,
            } => {
                self.line(&format!("arithmetic {op} : {ty}"));
                self.nested(|p| {
                    p.expr(left);
                    p.expr(right);
                });
            }
            SqmExpr::Concat { left, right } => {
                self.line("concat");
                self.nested(|p| {
                    p.expr(left);
                    p.expr(right);
                });
            }
            SqmExpr::Negate(inner) => {
                self.line("negate");
                self.nested(|p| p.expr(inner));
            }
            SqmExpr::Case(case) => {
                self.line(&format!("case : {}", case.ty));
                self.nested(|p| {
                    match &case.branches {
                        SqmCaseBranches::Searched(whens) => {
                            for (when, then) in whens {
                                p.predicate(when);
                                p.expr(then);
                            }
                        }
                        SqmCaseBranches::Simple { operand, whens } => {
                            p.expr(operand);
                            for (when, then) in whens {
                                p.expr(when);
                                p.expr(then);
                            }
                        }
                    }
                    if let Some(otherwise) = &case.otherwise {
                        p.expr(otherwise);
                    }
                });
            }
            SqmExpr::Subquery(subquery) => {
                self.line(&format!("subquery {} : {}", subquery.id, subquery.ty));
                self.nested(|p| p.query_part(&subquery.query));
            }
        }
    }

    fn predicate(&mut self, predicate: &SqmPredicate) {
        match predicate {
            SqmPredicate::Junction { kind, predicates } => {
                self.line(&format!("{kind:?}").to_lowercase());
                self.nested(|p| predicates.iter().for_each(|n| p.predicate(n)));
            }
            SqmPredicate::Not(inner) => {
                self.line("not");
                self.nested(|p| p.predicate(inner));
            }
            SqmPredicate::Comparison { left, op, right } => {
                self.line(&format!("comparison {op}"));
                self.nested(|p| {
                    p.expr(left);
                    p.expr(right);
                });
            }
            SqmPredicate::IsNull { expr, negated } => {
                self.line(negation("is-null", *negated));
                self.nested(|p| p.expr(expr));
            }
            SqmPredicate::IsEmpty {
                collection,
                negated,
            } => {
                self.line(negation("is-empty", *negated));
                self.nested(|p| p.expr(&SqmExpr::Path(collection.clone())));
            }
            SqmPredicate::Between {
                expr,
                low,
                high,
                negated,
            } => {
                self.line(negation("between", *negated));
                self.nested(|p| {
                    p.expr(expr);
                    p.expr(low);
                    p.expr(high);
                });
            }
            SqmPredicate::Like {
                expr,
                pattern,
                escape,
                negated,
            } => {
                self.line(negation("like", *negated));
                self.nested(|p| {
                    p.expr(expr);
                    p.expr(pattern);
                    if let Some(escape) = escape {
                        p.expr(escape);
                    }
                });
            }
            SqmPredicate::InList {
                expr,
                values,
                negated,
            } => {
                self.line(negation("in-list", *negated));
                self.nested(|p| {
                    p.expr(expr);
                    values.iter().for_each(|v| p.expr(v));
                });
            }
            SqmPredicate::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                self.line(negation("in-subquery", *negated));
                self.nested(|p| {
                    p.expr(expr);
                    p.query_part(&subquery.query);
                });
            }
            SqmPredicate::MemberOf {
                expr,
                collection,
                negated,
            } => {
                self.line(negation("member-of", *negated));
                self.nested(|p| {
                    p.expr(expr);
                    p.expr(&SqmExpr::Path(collection.clone()));
                });
            }
            SqmPredicate::Exists { subquery, negated } => {
                self.line(negation("exists", *negated));
                self.nested(|p| p.query_part(&subquery.query));
            }
            SqmPredicate::BooleanExpr(expr) => {
                self.line("boolean");
                self.nested(|p| p.expr(expr));
            }
        }
    }
}

fn negation(name: &'static str, negated: bool) -> &'static str {
    if !negated {
        return name;
    }
    match name {
        "is-null" => "is-not-null",
        "is-empty" => "is-not-empty",
        "between" => "not-between",
        "like" => "not-like",
        "in-list" => "not-in-list",
        "in-subquery" => "not-in-subquery",
        "member-of" => "not-member-of",
        "exists" => "not-exists",
        other => other,
    }
}

fn literal_text(literal: &SqmLiteral) -> String {
    match literal {
        SqmLiteral::Integer(v) | SqmLiteral::Long(v) => v.to_string(),
        SqmLiteral::Float(v) | SqmLiteral::Double(v) => v.to_string(),
        SqmLiteral::BigInteger(v) | SqmLiteral::BigDecimal(v) => v.clone(),
        SqmLiteral::String(v) => format!("'{v}'"),
        SqmLiteral::Boolean(v) => v.to_string(),
        SqmLiteral::Null => "null".to_string(),
        SqmLiteral::Date(v) => format!("date '{v}'"),
        SqmLiteral::Time(v) => format!("time '{v}'"),
        SqmLiteral::Timestamp(v) => format!("timestamp '{v}'"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{EntityType, StaticDomainModel};
    use crate::function::FunctionRegistry;
    use crate::sqm::node::{CreationOptions, NodeBuilder};
    use crate::sqm::select::ResultType;
    use crate::sqm::types::SqmType;

    #[test]
    fn test_print_criteria_statement() {
        let model = StaticDomainModel::new().with_entity(
            EntityType::new("Person", "person")
                .id("id", SqmType::Long)
                .basic("name", SqmType::String),
        );
        let nb = NodeBuilder::new(
            Arc::new(model),
            Arc::new(FunctionRegistry::standard()),
            CreationOptions::default(),
        );
        let mut query = SelectStatement::criteria(&nb, ResultType::Object);
        let p = query.from_entity("Person").unwrap();
        let name = query.get(p, "name").unwrap();
        query.select(name.clone()).unwrap();
        query.where_(nb.is_not_null(name)).unwrap();

        let dump = SqmTreePrinter::print(&query);
        let lines: Vec<&str> = dump.lines().collect();
        assert!(lines[0].starts_with("select-statement"));
        assert!(lines.contains(&"    select"));
        assert!(lines.contains(&"    where"));
        assert!(lines.contains(&"      is-not-null"));
        assert!(dump.contains("Person"));
    }
}
