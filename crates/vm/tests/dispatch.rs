//! The three dispatch backends must be observationally identical.

mod common;

use common::{parse, run_counted};
use viper_vm::DispatchStrategy;

const STRATEGIES: [DispatchStrategy; 3] = [
    DispatchStrategy::Table,
    DispatchStrategy::Switch,
    DispatchStrategy::Threaded,
];

/// Iterative fibonacci over block parameters; fib(30) = 832040.
fn fib_text(n: u32) -> String {
    format!(
        "func @main() -> i64 {{\n\
         entry:\n\
         \x20 br loop(0, 1, {})\n\
         loop(%a: i64, %b: i64, %n: i64):\n\
         \x20 %done = scmp_le %n, 0\n\
         \x20 cbr %done, exit(%a), next(%a, %b, %n)\n\
         next(%a2: i64, %b2: i64, %n2: i64):\n\
         \x20 %sum = add %a2, %b2\n\
         \x20 %n3 = sub %n2, 1\n\
         \x20 br loop(%b2, %sum, %n3)\n\
         exit(%r: i64):\n\
         \x20 ret %r\n\
         }}\n",
        n
    )
}

#[test]
fn test_backends_agree_on_exit_value_and_count() {
    let module = parse(&fib_text(30));
    let mut outcomes = Vec::new();
    for strategy in STRATEGIES {
        let (result, count) = run_counted(&module, strategy, 0);
        outcomes.push((strategy.name(), result.unwrap(), count));
    }
    assert_eq!(outcomes[0].1, 832_040);
    for window in outcomes.windows(2) {
        assert_eq!(
            window[0].1, window[1].1,
            "{} and {} disagree on exit value",
            window[0].0, window[1].0
        );
        assert_eq!(
            window[0].2, window[1].2,
            "{} and {} disagree on instruction count",
            window[0].0, window[1].0
        );
    }
}

#[test]
fn test_backends_agree_on_traps() {
    let module = parse(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 %r = sdiv.chk0 1, 0\n\
         \x20 ret %r\n\
         }\n",
    );
    let mut diags = Vec::new();
    for strategy in STRATEGIES {
        let (result, count) = run_counted(&module, strategy, 0);
        diags.push((result.unwrap_err().to_string(), count));
    }
    assert_eq!(diags[0], diags[1]);
    assert_eq!(diags[1], diags[2]);
}

#[test]
fn test_backends_agree_under_eh_resume() {
    let module = parse(
        "func @main() -> i64 {\n\
         entry:\n\
         \x20 eh.push handler\n\
         \x20 br body\n\
         body:\n\
         \x20 %r = sdiv.chk0 10, 0\n\
         \x20 eh.pop\n\
         \x20 ret 42\n\
         handler(%err: error, %tok: resume_tok):\n\
         \x20 resume.next %tok\n\
         }\n",
    );
    for strategy in STRATEGIES {
        let (result, _) = run_counted(&module, strategy, 0);
        assert_eq!(result.unwrap(), 42, "strategy {}", strategy.name());
    }
}

#[test]
fn test_strategy_parsing() {
    assert_eq!(DispatchStrategy::parse("table"), Some(DispatchStrategy::Table));
    assert_eq!(DispatchStrategy::parse("switch"), Some(DispatchStrategy::Switch));
    assert_eq!(
        DispatchStrategy::parse("threaded"),
        Some(DispatchStrategy::Threaded)
    );
    assert_eq!(DispatchStrategy::parse("jit"), None);
}
