//! モニタコマンドのテスト（合成イメージを使用）

use ldb_core::{Arch, Control, Monitor, ResolveError};
use ldb_heap::{HeapScanner, ImageBuilder, Segment, SymbolSearch, Word};
use ldb_target::MemoryReader;
use std::cell::RefCell;
use std::rc::Rc;

fn run(monitor: &mut Monitor, line: &str) -> (ldb_core::Result<Control>, String) {
    let mut out = Vec::new();
    let result = monitor.execute(line, &mut out);
    (result, String::from_utf8(out).unwrap())
}

fn run_ok(monitor: &mut Monitor, line: &str) -> String {
    let (result, out) = run(monitor, line);
    assert_eq!(result.unwrap(), Control::Continue, "line: {}", line);
    out
}

fn resolve_error(result: ldb_core::Result<Control>) -> ResolveError {
    result
        .unwrap_err()
        .downcast::<ResolveError>()
        .expect("expected a resolve error")
}

#[test]
fn test_print_numbers_and_registers() {
    let mut monitor = Monitor::demo(Arch::X86_64).unwrap();
    let out = run_ok(&mut monitor, "print 42 $rax");
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("fixnum 21"), "{}", lines[0]);
    assert!(lines[1].ends_with("fixnum 42"), "{}", lines[1]);
}

#[test]
fn test_print_symbols() {
    let mut monitor = Monitor::demo(Arch::X86_64).unwrap();
    let out = run_ok(&mut monitor, "p *FOO* $rcx");
    assert_eq!(out.matches("(symbol *FOO*)").count(), 2, "{}", out);
}

#[test]
fn test_search_prefers_static_space() {
    let mut monitor = Monitor::demo(Arch::X86_64).unwrap();
    let out = run_ok(&mut monitor, "search T");
    assert!(out.contains("(symbol T)"), "{}", out);

    let t = monitor.resolver().find_symbol("T").unwrap();
    assert!(monitor.spaces().static_space.contains(t.untagged()));
    // $t は static の T を指す
    assert_eq!(monitor.vars().get("t"), Some(ldb_core::VarValue::Word(t.raw())));

    let out = run_ok(&mut monitor, "search NOTHING");
    assert_eq!(out.trim(), "symbol 'NOTHING' not found");
}

#[test]
fn test_dump_from_stack_pointer() {
    let mut monitor = Monitor::demo(Arch::X86_64).unwrap();
    let out = run_ok(&mut monitor, "dump $sp 3");
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3, "{}", out);
    assert!(lines[0].ends_with("fixnum 0"));
    assert!(lines[1].ends_with("fixnum 10"));
    assert!(lines[2].ends_with("fixnum 20"));

    let out = run_ok(&mut monitor, "x $sp");
    assert_eq!(out.lines().count(), 1);
}

#[test]
fn test_dump_unsafe_address() {
    let mut monitor = Monitor::demo(Arch::X86_64).unwrap();
    let (result, out) = run(&mut monitor, "dump 0x10 4");
    assert_eq!(resolve_error(result), ResolveError::UnsafeAddress(0x10));
    assert!(out.is_empty());
}

#[test]
fn test_error_discards_rest_of_line() {
    let mut monitor = Monitor::demo(Arch::X86_64).unwrap();
    let (result, out) = run(&mut monitor, "print 1 @0x0 2");
    assert_eq!(resolve_error(result), ResolveError::InvalidAddress("@0x0".into()));
    assert_eq!(out.lines().count(), 1);

    let (result, _) = run(&mut monitor, "print");
    assert_eq!(resolve_error(result), ResolveError::ExpectedObject);
}

#[test]
fn test_set_and_list_variables() {
    let mut monitor = Monitor::demo(Arch::X86_64).unwrap();
    run_ok(&mut monitor, "set $x 0x10");
    let out = run_ok(&mut monitor, "print $x");
    assert!(out.trim_end().ends_with("fixnum 8"), "{}", out);

    let out = run_ok(&mut monitor, "vars");
    assert!(out.contains("$x = 0x0000000000000010"), "{}", out);
    assert!(out.contains("$sp = register 4 (RSP)"), "{}", out);

    let (result, _) = run(&mut monitor, "set y bogus-symbol");
    assert_eq!(resolve_error(result), ResolveError::InvalidObject("bogus-symbol".into()));
    assert!(monitor.vars().get("y").is_none());
}

#[test]
fn test_regs_and_contexts() {
    let mut monitor = Monitor::demo(Arch::X86_64).unwrap();
    let out = run_ok(&mut monitor, "regs");
    assert!(out.contains(" RAX = 0x0000000000000054"), "{}", out);
    assert!(out.contains("  PC = 0x0000000040001000"), "{}", out);
    assert_eq!(run_ok(&mut monitor, "contexts").trim(), "1 interrupt context(s)");

    monitor.contexts_mut().pop();
    let out = run_ok(&mut monitor, "regs");
    assert_eq!(out.trim(), "there is no current interrupt context");
    let (result, _) = run(&mut monitor, "print $rax");
    assert_eq!(resolve_error(result), ResolveError::NoInterruptContext("$rax".into()));
}

#[test]
fn test_interleaved_registers_in_demo() {
    let mut monitor = Monitor::demo(Arch::X86).unwrap();
    let out = run_ok(&mut monitor, "print $eax $R0");
    assert_eq!(out.matches("fixnum 42").count(), 2, "{}", out);
    let (result, _) = run(&mut monitor, "print $R8");
    assert_eq!(resolve_error(result), ResolveError::UnknownRegister("$R8".into()));
}

#[test]
fn test_unknown_and_quit_commands() {
    let mut monitor = Monitor::demo(Arch::X86_64).unwrap();
    let out = run_ok(&mut monitor, "frobnicate 1 2");
    assert!(out.starts_with("unknown command: 'frobnicate'"));
    assert!(run_ok(&mut monitor, "   ").is_empty());
    assert!(run_ok(&mut monitor, "help").contains("Available commands:"));

    let (result, _) = run(&mut monitor, "quit");
    assert_eq!(result.unwrap(), Control::Quit);
}

#[test]
fn test_monitor_over_custom_image() {
    let builder = ImageBuilder::standard(false).unwrap();
    let (memory, layout) = builder.finish();
    let start = layout.static_space.start;
    assert_eq!(memory.read_word(start).unwrap(), 0);

    let mut monitor = Monitor::new(Box::new(memory), layout, Arch::X86_64);
    let out = run_ok(&mut monitor, &format!("dump {:#x} 2", start));
    assert_eq!(out.lines().count(), 2);
    assert_eq!(run_ok(&mut monitor, "vars").trim(), "no variables defined");
}

#[test]
fn test_missing_names_are_typed_errors() {
    let mut monitor = Monitor::demo(Arch::X86_64).unwrap();
    let (result, _) = run(&mut monitor, "search");
    assert_eq!(resolve_error(result), ResolveError::ExpectedName);
    let (result, _) = run(&mut monitor, "set");
    assert_eq!(resolve_error(result), ResolveError::ExpectedName);
    let (result, _) = run(&mut monitor, "set $ 1");
    assert_eq!(resolve_error(result), ResolveError::InvalidName("$".into()));
    let (result, _) = run(&mut monitor, "set $y");
    assert_eq!(resolve_error(result), ResolveError::ExpectedObject);
}

#[test]
fn test_externally_defined_register_variable() {
    let mut monitor = Monitor::demo(Arch::X86).unwrap();
    assert_eq!(monitor.arch(), Arch::X86);
    assert_eq!(monitor.pid(), None);

    // ECX には *FOO* が入っている
    monitor.vars_mut().define_register("foo", 1);
    let out = run_ok(&mut monitor, "print $foo");
    assert!(out.contains("(symbol *FOO*)"), "{}", out);
}

/// 探索した名前を記録するシンボル探索
struct NameLog {
    names: Rc<RefCell<Vec<String>>>,
}

impl SymbolSearch for NameLog {
    fn search(&self, memory: &dyn MemoryReader, segment: Segment, name: &str) -> Option<Word> {
        self.names.borrow_mut().push(name.to_string());
        HeapScanner::new().search(memory, segment, name)
    }
}

#[test]
fn test_replaced_symbol_search() {
    let names = Rc::new(RefCell::new(Vec::new()));
    let mut monitor = Monitor::demo(Arch::X86_64)
        .unwrap()
        .with_search(Box::new(NameLog { names: Rc::clone(&names) }));

    // 数値と $ 変数はシンボル探索に回らない
    run_ok(&mut monitor, "print 42 $t T");
    assert_eq!(*names.borrow(), vec!["T".to_string()]);

    // 見つからない名前は全空間を探す
    names.borrow_mut().clear();
    let (result, _) = run(&mut monitor, "print NOTHING");
    assert_eq!(resolve_error(result), ResolveError::InvalidObject("NOTHING".into()));
    assert_eq!(names.borrow().len(), 3);
}
