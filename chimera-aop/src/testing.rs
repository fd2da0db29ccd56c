//! 单元测试共用的目标类型

use crate::error::{AopError, InvocationResult};
use crate::object::{
    Arguments, ClassDescriptor, InterfaceDescriptor, Invocable, MethodDescriptor, ObjectRef,
    ReturnValue,
};
use once_cell::sync::Lazy;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub static ADD: MethodDescriptor =
    MethodDescriptor::new("com.example.Calculator", "add", &["i32", "i32"], "i32");
pub static DIVIDE: MethodDescriptor =
    MethodDescriptor::new("com.example.Calculator", "divide", &["i32", "i32"], "i32");
pub static CALCULATOR: InterfaceDescriptor =
    InterfaceDescriptor::new("com.example.Calculator", &[&ADD, &DIVIDE]);

pub static RESET: MethodDescriptor =
    MethodDescriptor::new("com.example.CalculatorImpl", "reset", &[], "()").with_final();
pub static CALLS: MethodDescriptor =
    MethodDescriptor::new("com.example.CalculatorImpl", "calls", &[], "usize");

pub static CALCULATOR_CLASS: Lazy<ClassDescriptor> = Lazy::new(|| {
    ClassDescriptor::new("com.example.CalculatorImpl")
        .implementing(&CALCULATOR)
        .with_method(&RESET)
        .with_method(&CALLS)
});

#[derive(Debug, thiserror::Error)]
#[error("division by zero")]
pub struct DivisionByZero;

/// 实现 Calculator 接口的目标，记录被调用的次数
#[derive(Debug, Default)]
pub struct CalculatorImpl {
    calls: AtomicUsize,
    offset: i32,
}

impl CalculatorImpl {
    pub fn new() -> Self {
        Self::default()
    }

    /// 结果都加上固定偏移，用来区分热替换前后的目标
    pub fn with_offset(offset: i32) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            offset,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Invocable for CalculatorImpl {
    fn class(&self) -> &ClassDescriptor {
        &CALCULATOR_CLASS
    }

    fn invoke(&self, method: &MethodDescriptor, args: &Arguments) -> InvocationResult<ReturnValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method.name() {
            "add" => {
                let a: i32 = args.extract(method, 0)?;
                let b: i32 = args.extract(method, 1)?;
                Ok(ReturnValue::new(a + b + self.offset))
            }
            "divide" => {
                let a: i32 = args.extract(method, 0)?;
                let b: i32 = args.extract(method, 1)?;
                if b == 0 {
                    return Err(DivisionByZero.into());
                }
                Ok(ReturnValue::new(a / b + self.offset))
            }
            "reset" => Ok(ReturnValue::unit()),
            "calls" => Ok(ReturnValue::new(self.calls())),
            _ => Err(AopError::NoSuchMethod {
                class: self.class().name().to_string(),
                method: method.name().to_string(),
            }
            .into()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub static GREET: MethodDescriptor =
    MethodDescriptor::new("com.example.Greeter", "greet", &["String"], "String");

pub static GREETER_CLASS: Lazy<ClassDescriptor> =
    Lazy::new(|| ClassDescriptor::new("com.example.Greeter").with_method(&GREET));

pub static SEALED_GREETER_CLASS: Lazy<ClassDescriptor> = Lazy::new(|| {
    ClassDescriptor::new("com.example.SealedGreeter")
        .with_method(&GREET)
        .sealed()
});

/// 没有接口的目标
#[derive(Debug, Default)]
pub struct Greeter {
    sealed: bool,
}

impl Greeter {
    pub fn sealed() -> Self {
        Self { sealed: true }
    }
}

impl Invocable for Greeter {
    fn class(&self) -> &ClassDescriptor {
        if self.sealed {
            &SEALED_GREETER_CLASS
        } else {
            &GREETER_CLASS
        }
    }

    fn invoke(&self, method: &MethodDescriptor, args: &Arguments) -> InvocationResult<ReturnValue> {
        match method.name() {
            "greet" => {
                let name: String = args.extract(method, 0)?;
                Ok(ReturnValue::new(format!("Hello, {}!", name)))
            }
            _ => Err(AopError::NoSuchMethod {
                class: self.class().name().to_string(),
                method: method.name().to_string(),
            }
            .into()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn calculator() -> ObjectRef {
    Arc::new(CalculatorImpl::new())
}

pub fn add(object: &ObjectRef, a: i32, b: i32) -> InvocationResult<i32> {
    Ok(object
        .invoke(&ADD, &Arguments::new().with(a).with(b))?
        .downcast::<i32>()?)
}
