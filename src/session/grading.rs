/// Drop every whitespace character.
pub fn normalize_code(code: &str) -> String {
    code.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Practical answers are right when they match the reference solution once
/// all whitespace is removed. Nothing is compiled or run.
pub fn code_matches(submitted: &str, solution: &str) -> bool {
    normalize_code(submitted) == normalize_code(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLUTION: &str = "#include <stdio.h>\n\nint main() {\n    int a = 5;\n    int b = 10;\n    int sum = a + b;\n    printf(\"Sum: %d\\n\", sum);\n    return 0;\n}";

    #[test]
    fn test_exact_solution_matches() {
        assert!(code_matches(SOLUTION, SOLUTION));
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let squashed = "#include<stdio.h>\nint main(){int a=5;int b=10;int sum=a+b;printf(\"Sum:%d\\n\",sum);return 0;}";
        assert!(code_matches(squashed, SOLUTION));
        let spread = format!("\n\n\t{}   \r\n", SOLUTION.replace(' ', "   "));
        assert!(code_matches(&spread, SOLUTION));
    }

    #[test]
    fn test_token_difference_fails() {
        let wrong = SOLUTION.replace("sum = a + b", "sum = a - b");
        assert!(!code_matches(&wrong, SOLUTION));
    }

    #[test]
    fn test_template_does_not_match_solution() {
        let template = "#include <stdio.h>\n\nint main() {\n    int a = 5;\n    int b = 10;\n    // Write your code here\n    return 0;\n}";
        assert!(!code_matches(template, SOLUTION));
    }
}
