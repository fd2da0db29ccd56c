//! 切点表达式
//!
//! 支持 AspectJ 风格表达式的一个子集，编译一次后用于所有匹配查询：
//!
//! ```text
//! execution(* com.example..*.*(..))
//! execution(public i32 Calculator.add(i32, ..))
//! within(com.example.service.*) && !execution(* *.health_check())
//! ```
//!
//! 类型模式中 `*` 匹配一个名字段内的任意字符，`..` 匹配任意层级的包；
//! `::` 会被当作 `.` 处理。不含 `.` 的类型模式也会和简单类名比较。
//! 类型匹配遵循子类型语义：类自身、父类或任一接口匹配即可。

use crate::error::{AopError, AopResult};
use crate::object::{normalize_type_name, ClassDescriptor, MethodDescriptor};
use crate::pointcut::{ClassFilter, MethodMatcher, Pointcut};
use regex::Regex;
use std::fmt;

/// 编译后的类型/名称模式
#[derive(Clone)]
struct TypePattern {
    regex: Option<Regex>,
    simple: bool,
}

impl TypePattern {
    fn compile(source: &str) -> Result<Self, String> {
        let source = normalize_type_name(source);
        if source.is_empty() {
            return Err("empty type pattern".to_string());
        }
        if source == "*" {
            return Ok(Self {
                regex: None,
                simple: false,
            });
        }
        if source.ends_with("..") {
            return Err(format!("type pattern '{}' cannot end with '..'", source));
        }
        if let Some(bad) = source.chars().find(|c| matches!(c, '(' | ')' | '!' | '&' | '|')) {
            return Err(format!("unexpected '{}' in type pattern '{}'", bad, source));
        }

        let mut pattern = String::from("^");
        let mut rest = source.as_str();
        while let Some(c) = rest.chars().next() {
            if rest.starts_with("..") {
                pattern.push_str(r"\.(?:.*\.)?");
                rest = &rest[2..];
            } else if c == '*' {
                pattern.push_str("[^.]*");
                rest = &rest[1..];
            } else {
                pattern.push_str(&regex::escape(&c.to_string()));
                rest = &rest[c.len_utf8()..];
            }
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| e.to_string())?;
        let simple = !source.contains('.');
        Ok(Self {
            regex: Some(regex),
            simple,
        })
    }

    fn matches_name(&self, name: &str) -> bool {
        let Some(regex) = &self.regex else {
            return true;
        };
        let name = normalize_type_name(name);
        if regex.is_match(&name) {
            return true;
        }
        self.simple
            && name
                .rsplit('.')
                .next()
                .is_some_and(|simple_name| regex.is_match(simple_name))
    }

    fn matches_class(&self, class: &ClassDescriptor) -> bool {
        class.type_names().iter().any(|name| self.matches_name(name))
    }
}

/// 参数模式
#[derive(Clone)]
enum ParamPattern {
    /// `..` 零个或多个参数
    AnySequence,
    /// `*` 恰好一个任意类型参数
    AnyOne,
    Type(TypePattern),
}

fn match_params(patterns: &[ParamPattern], types: &[&str]) -> bool {
    match patterns.split_first() {
        None => types.is_empty(),
        Some((ParamPattern::AnySequence, rest)) => {
            (0..=types.len()).any(|skip| match_params(rest, &types[skip..]))
        }
        Some((ParamPattern::AnyOne, rest)) => !types.is_empty() && match_params(rest, &types[1..]),
        Some((ParamPattern::Type(pattern), rest)) => {
            types.first().is_some_and(|ty| pattern.matches_name(ty)) && match_params(rest, &types[1..])
        }
    }
}

/// `execution(...)` 的各个部分
#[derive(Clone)]
struct ExecutionPattern {
    return_type: TypePattern,
    declaring_type: Option<TypePattern>,
    name: TypePattern,
    params: Vec<ParamPattern>,
}

impl ExecutionPattern {
    fn matches_class(&self, class: &ClassDescriptor) -> bool {
        self.declaring_type
            .as_ref()
            .map_or(true, |pattern| pattern.matches_class(class))
    }

    fn matches_method(&self, method: &MethodDescriptor, class: &ClassDescriptor) -> bool {
        let declaring_ok = match &self.declaring_type {
            None => true,
            // 声明类型自身，或目标类继承该方法时的目标类
            Some(pattern) => {
                pattern.matches_name(method.declaring_type())
                    || (class.is_assignable_to(method.declaring_type())
                        && pattern.matches_name(class.name()))
            }
        };
        declaring_ok
            && self.name.matches_name(method.name())
            && self.return_type.matches_name(method.return_type())
            && match_params(&self.params, method.param_types())
    }
}

#[derive(Clone)]
enum Expr {
    Execution(ExecutionPattern),
    Within(TypePattern),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// 类级判断：是否可能有连接点落在该类型上
    fn could_match_class(&self, class: &ClassDescriptor) -> bool {
        match self {
            Expr::Execution(execution) => execution.matches_class(class),
            Expr::Within(pattern) => pattern.matches_name(class.name()),
            Expr::And(left, right) => left.could_match_class(class) && right.could_match_class(class),
            Expr::Or(left, right) => left.could_match_class(class) || right.could_match_class(class),
            // 只有纯类型条件可以在类级取反，其余情况保守地放行
            Expr::Not(inner) => match inner.as_ref() {
                Expr::Within(pattern) => !pattern.matches_name(class.name()),
                _ => true,
            },
        }
    }

    fn matches_method(&self, method: &MethodDescriptor, class: &ClassDescriptor) -> bool {
        match self {
            Expr::Execution(execution) => execution.matches_method(method, class),
            Expr::Within(pattern) => pattern.matches_name(class.name()),
            Expr::And(left, right) => {
                left.matches_method(method, class) && right.matches_method(method, class)
            }
            Expr::Or(left, right) => {
                left.matches_method(method, class) || right.matches_method(method, class)
            }
            Expr::Not(inner) => !inner.matches_method(method, class),
        }
    }
}

const MODIFIERS: &[&str] = &["public", "protected", "private", "static", "final"];

/// 递归下降解析器
struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn consume(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn parse(mut self) -> Result<Expr, String> {
        let expr = self.parse_or()?;
        self.skip_whitespace();
        if !self.rest().is_empty() {
            return Err(format!("unexpected trailing input '{}'", self.rest()));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.consume("||") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        while self.consume("&&") {
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.consume("!") {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        if self.consume("(") {
            let expr = self.parse_or()?;
            if !self.consume(")") {
                return Err("missing ')'".to_string());
            }
            return Ok(expr);
        }
        self.parse_primitive()
    }

    fn parse_primitive(&mut self) -> Result<Expr, String> {
        self.skip_whitespace();
        let designator: String = self
            .rest()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        if designator.is_empty() {
            return Err(match self.rest().chars().next() {
                Some(c) => format!("unexpected '{}'", c),
                None => "unexpected end of expression".to_string(),
            });
        }
        self.pos += designator.len();
        if !self.consume("(") {
            return Err(format!("expected '(' after '{}'", designator));
        }
        let body = self.take_balanced()?;

        match designator.as_str() {
            "execution" => parse_execution(body).map(Expr::Execution),
            "within" => TypePattern::compile(body.trim()).map(Expr::Within),
            other => Err(format!("unsupported pointcut designator '{}'", other)),
        }
    }

    /// 读取到与已消费的 `(` 配对的 `)` 为止
    fn take_balanced(&mut self) -> Result<&'a str, String> {
        let start = self.pos;
        let mut depth = 1;
        for (offset, c) in self.rest().char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let body = &self.src[start..start + offset];
                        self.pos = start + offset + 1;
                        return Ok(body);
                    }
                }
                _ => {}
            }
        }
        Err("unbalanced parentheses".to_string())
    }
}

fn parse_execution(body: &str) -> Result<ExecutionPattern, String> {
    let body = body.trim();
    let open = body
        .find('(')
        .ok_or_else(|| "execution pattern requires a parameter list".to_string())?;
    if !body.ends_with(')') {
        return Err("execution pattern must end with a parameter list".to_string());
    }
    let params = parse_params(&body[open + 1..body.len() - 1])?;

    let mut tokens: Vec<&str> = body[..open].split_whitespace().collect();
    let qualified_name = tokens
        .pop()
        .ok_or_else(|| "missing method name pattern".to_string())?;
    let mut tokens = tokens.into_iter().skip_while(|t| MODIFIERS.contains(t));
    let return_type = tokens
        .next()
        .ok_or_else(|| "missing return type pattern".to_string())?;
    if let Some(extra) = tokens.next() {
        return Err(format!("unexpected token '{}'", extra));
    }

    let qualified_name = normalize_type_name(qualified_name);
    let (declaring_type, name) = match qualified_name.rsplit_once('.') {
        None => (None, qualified_name.as_str()),
        Some((declaring, name)) if declaring.ends_with('.') => {
            (Some(format!("{}.*", declaring)), name)
        }
        Some((declaring, name)) => (Some(declaring.to_string()), name),
    };
    if name.is_empty() {
        return Err("missing method name pattern".to_string());
    }

    Ok(ExecutionPattern {
        return_type: TypePattern::compile(return_type)?,
        declaring_type: declaring_type.as_deref().map(TypePattern::compile).transpose()?,
        name: TypePattern::compile(name)?,
        params,
    })
}

fn parse_params(list: &str) -> Result<Vec<ParamPattern>, String> {
    let list = list.trim();
    if list.is_empty() {
        return Ok(Vec::new());
    }

    // 按深度为 0 的逗号切分，泛型参数里的逗号不算
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            ',' if depth == 0 => {
                items.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&list[start..]);

    items
        .into_iter()
        .map(|item| match item.trim() {
            "" => Err("empty parameter pattern".to_string()),
            ".." => Ok(ParamPattern::AnySequence),
            "*" => Ok(ParamPattern::AnyOne),
            other => TypePattern::compile(other).map(ParamPattern::Type),
        })
        .collect()
}

/// 表达式切点
///
/// 同时充当类过滤器和方法匹配器。编译错误在构造时一次性报告。
#[derive(Clone)]
pub struct ExpressionPointcut {
    expression: String,
    root: Expr,
}

impl ExpressionPointcut {
    /// 编译切点表达式
    pub fn compile(expression: &str) -> AopResult<Self> {
        let root = Parser::new(expression)
            .parse()
            .map_err(|reason| AopError::PointcutCompile {
                expression: expression.to_string(),
                reason,
            })?;
        tracing::trace!("Compiled pointcut expression: {}", expression);
        Ok(Self {
            expression: expression.to_string(),
            root,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 与运算
    pub fn and(self, other: ExpressionPointcut) -> Self {
        Self {
            expression: format!("({}) && ({})", self.expression, other.expression),
            root: Expr::And(Box::new(self.root), Box::new(other.root)),
        }
    }

    /// 或运算
    pub fn or(self, other: ExpressionPointcut) -> Self {
        Self {
            expression: format!("({}) || ({})", self.expression, other.expression),
            root: Expr::Or(Box::new(self.root), Box::new(other.root)),
        }
    }

    /// 非运算
    pub fn negate(self) -> Self {
        Self {
            expression: format!("!({})", self.expression),
            root: Expr::Not(Box::new(self.root)),
        }
    }
}

impl ClassFilter for ExpressionPointcut {
    fn matches(&self, class: &ClassDescriptor) -> bool {
        self.root.could_match_class(class)
    }
}

impl MethodMatcher for ExpressionPointcut {
    fn matches(&self, method: &MethodDescriptor, target_class: &ClassDescriptor) -> bool {
        self.root.matches_method(method, target_class)
    }
}

impl Pointcut for ExpressionPointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        self
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        self
    }
}

impl fmt::Debug for ExpressionPointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpressionPointcut({})", self.expression)
    }
}

impl fmt::Display for ExpressionPointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
