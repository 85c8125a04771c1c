//! The declarative rules against imported class files.

#[path = "../../arch-graph-core/tests/support/mod.rs"]
mod support;

use arch_graph_core::{Analyzer, ClassFileImporter, Config, DomainGraph, Severity};
use arch_graph_rules::{
    rules_from_config, ArchRule, DenyPackageDep, LayerDependency, PackageCycle, RulesConfig,
};
use support::{ClassBuilder, Insn, Method, ACC_PUBLIC, ACC_STATIC};

const CONFIG: &str = r#"
[[layers]]
name = "web"
packages = ["com.example.*.web.."]

[[layers]]
name = "domain"
packages = ["com.example.*.domain.."]

[dependencies]
web = ["domain"]
domain = []

[[deny-package-dep]]
from = "..domain.."
to = ["java.sql.."]

[[cycles]]
slices = "com.example.(*).."
"#;

fn classes() -> Vec<ClassBuilder> {
    vec![
        ClassBuilder::class("com.example.order.web.OrderController")
            .source_file("OrderController.java")
            .field("order", "Lcom/example/order/domain/Order;")
            .method(
                Method::new("ping", "()V").flags(ACC_PUBLIC | ACC_STATIC),
            ),
        ClassBuilder::class("com.example.order.domain.Order")
            .source_file("Order.java")
            .field("invoice", "Lcom/example/billing/domain/Invoice;")
            .method(Method::new("notifyWeb", "()V").code(vec![
                Insn::Line(33),
                Insn::InvokeStatic("com/example/order/web/OrderController", "ping", "()V"),
            ])),
        ClassBuilder::class("com.example.order.domain.OrderRepo")
            .source_file("OrderRepo.java")
            .field("connection", "Ljava/sql/Connection;"),
        ClassBuilder::class("com.example.billing.domain.Invoice")
            .source_file("Invoice.java")
            .method(Method::new("attach", "(Lcom/example/order/domain/Order;)V")),
        ClassBuilder::class("com.example.shipping.domain.Parcel")
            .source_file("Parcel.java")
            .field("order", "Lcom/example/order/domain/Order;"),
    ]
}

fn graph() -> DomainGraph {
    ClassFileImporter::new()
        .import_bytes(support::in_memory(&classes()))
        .unwrap()
        .graph
}

fn config() -> RulesConfig {
    RulesConfig::parse(CONFIG).unwrap()
}

#[test]
fn layer_dependency_reports_disallowed_targets_once() {
    let rule = LayerDependency::new(&config()).unwrap();
    let violations = rule.check(&graph());

    assert_eq!(violations.len(), 1);
    let v = &violations[0];
    assert_eq!(v.code, "LAYER001");
    assert_eq!(v.location.class, "com.example.order.domain.Order");
    assert_eq!(v.location.source_file.as_deref(), Some("Order.java"));
    assert_eq!(v.location.line, Some(33));
    assert!(v.message.starts_with("domain -> web dependency not allowed"));
    assert_eq!(v.suggestion.as_deref(), Some("layer 'domain' may depend on: none"));
}

#[test]
fn deny_package_dep_reports_matching_targets() {
    let rule = DenyPackageDep::new(&config().deny_package_deps).unwrap();
    let violations = rule.check(&graph());

    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].location.class, "com.example.order.domain.OrderRepo");
    assert_eq!(violations[0].location.line, None);
    assert_eq!(violations[0].severity, Severity::Error);
}

#[test]
fn custom_deny_message_and_severity() {
    let mut config = config();
    config.deny_package_deps[0].message = Some("no JDBC in the domain".into());
    config.deny_package_deps[0].severity = Some(Severity::Warning);
    let rule = DenyPackageDep::new(&config.deny_package_deps).unwrap();

    let violations = rule.check(&graph());
    assert_eq!(violations[0].message, "no JDBC in the domain");
    assert_eq!(violations[0].severity, Severity::Warning);
}

#[test]
fn package_cycle_reports_each_cycle_once() {
    let rule = PackageCycle::new(&config().cycles).unwrap();
    let violations = rule.check(&graph());

    assert_eq!(violations.len(), 1);
    let v = &violations[0];
    assert!(v.message.ends_with("form a dependency cycle: billing, order"));
    assert_eq!(v.location.class, "com.example.billing.domain.Invoice");
    assert_eq!(
        v.suggestion.as_deref(),
        Some(
            "billing -> order: com.example.billing.domain.Invoice has parameter of type \
             com.example.order.domain.Order; order -> billing: com.example.order.domain.Order \
             has field of type com.example.billing.domain.Invoice"
        )
    );
}

#[test]
fn acyclic_slices_pass() {
    let rule = PackageCycle::new(&config().cycles).unwrap();
    let acyclic: Vec<ClassBuilder> = classes()
        .into_iter()
        .filter(|c| !c.relative_path().contains("billing"))
        .collect();
    let graph = ClassFileImporter::new()
        .import_bytes(support::in_memory(&acyclic))
        .unwrap()
        .graph;
    assert!(rule.check(&graph).is_empty());
}

#[test]
fn analyzer_runs_configured_rules() {
    let dir = tempfile::tempdir().unwrap();
    support::write_class_dir(dir.path(), &classes());

    let mut builder = Analyzer::builder()
        .classpath(dir.path())
        .config(Config::parse(CONFIG).unwrap());
    for rule in rules_from_config(&config()).unwrap() {
        builder = builder.rule_box(rule);
    }
    let result = builder.build().unwrap().analyze().unwrap();

    assert_eq!(result.classes_checked, 5);
    assert!(result.import_diagnostics.is_empty());
    let rendered: Vec<String> = result.violations.iter().map(ToString::to_string).collect();
    insta::assert_snapshot!(rendered.join("\n"), @r"
    com.example.billing.domain.Invoice (Invoice.java): error [CYCLE001] Slices of 'com.example.(*)..' form a dependency cycle: billing, order
    com.example.order.domain.Order (Order.java:33): error [LAYER001] domain -> web dependency not allowed: com.example.order.domain.Order calls method of com.example.order.web.OrderController
    com.example.order.domain.OrderRepo (OrderRepo.java): error [PKG001] com.example.order.domain.OrderRepo has field of type java.sql.Connection, but '..domain..' must not depend on 'java.sql..'
    ");
}

#[test]
fn severity_overrides_apply_to_rules() {
    let core = Config::parse(&format!(
        "{CONFIG}\n[rules.package-cycle]\nseverity = \"info\"\n\n[rules.deny-package-dep]\nenabled = false\n"
    ))
    .unwrap();
    let analyzer = rules_from_config(&config())
        .unwrap()
        .into_iter()
        .fold(Analyzer::builder().classpath(".").config(core), |b, r| {
            b.rule_box(r)
        })
        .build()
        .unwrap();

    let result = analyzer.check(&graph());
    let codes: Vec<(&str, Severity)> = result
        .violations
        .iter()
        .map(|v| (v.code.as_str(), v.severity))
        .collect();
    assert_eq!(
        codes,
        vec![("CYCLE001", Severity::Info), ("LAYER001", Severity::Error)]
    );
    assert!(result.has_errors());
}
