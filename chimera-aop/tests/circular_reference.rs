//! 循环依赖下的自动代理流程

use chimera_aop::anyhow;
use chimera_aop::prelude::*;
use chimera_aop_macros::{aop_class, aop_interface};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};

#[aop_interface(name = "com.example.cycle.Ping")]
pub trait Ping: Send + Sync {
    fn ping(&self, depth: u32) -> anyhow::Result<u32>;
}

#[aop_interface(name = "com.example.cycle.Pong")]
pub trait Pong: Send + Sync {
    fn pong(&self, depth: u32) -> anyhow::Result<u32>;
}

#[derive(Default)]
pub struct PingService {
    pong: OnceCell<ObjectRef>,
}

#[aop_class(name = "com.example.cycle.PingService", interfaces(Ping))]
impl PingService {
    pub fn set_pong(&self, pong: ObjectRef) -> anyhow::Result<()> {
        self.pong
            .set(pong)
            .map_err(|_| anyhow::anyhow!("pong already set"))
    }
}

impl Ping for PingService {
    fn ping(&self, depth: u32) -> anyhow::Result<u32> {
        match (depth, self.pong.get()) {
            (0, _) | (_, None) => Ok(0),
            (_, Some(pong)) => Ok(pong.pong(depth - 1)? + 1),
        }
    }
}

#[derive(Default)]
pub struct PongService {
    ping: OnceCell<ObjectRef>,
}

#[aop_class(name = "com.example.cycle.PongService", interfaces(Pong))]
impl PongService {
    pub fn set_ping(&self, ping: ObjectRef) -> anyhow::Result<()> {
        self.ping
            .set(ping)
            .map_err(|_| anyhow::anyhow!("ping already set"))
    }
}

impl Pong for PongService {
    fn pong(&self, depth: u32) -> anyhow::Result<u32> {
        match (depth, self.ping.get()) {
            (0, _) | (_, None) => Ok(0),
            (_, Some(ping)) => Ok(ping.ping(depth - 1)? + 1),
        }
    }
}

fn creator(counter: Arc<AtomicUsize>) -> DefaultAdvisorAutoProxyCreator {
    let registry = AdvisorRegistry::new();
    registry
        .register(Arc::new(
            ExpressionPointcutAdvisor::new(
                "cycleCounter",
                "execution(* com.example.cycle..*.*(..))",
                Advice::before_fn(move |_, _, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap(),
        ))
        .unwrap();
    DefaultAdvisorAutoProxyCreator::new(Arc::new(registry))
}

#[test]
fn test_circular_beans_share_one_proxy() {
    let counter = Arc::new(AtomicUsize::new(0));
    let creator = creator(counter.clone());
    let mut session = CreationSession::new();

    // 1. 创建 ping，注入 pong 时 pong 又需要 ping
    let raw_ping: ObjectRef = Arc::new(PingService::default());
    let raw_pong: ObjectRef = Arc::new(PongService::default());

    // 2. pong 拿到 ping 的提前引用
    let early_ping = creator
        .get_early_bean_reference(Arc::clone(&raw_ping), "ping", &mut session)
        .unwrap();
    assert!(utils::is_aop_proxy(early_ping.as_ref()));
    raw_pong.set_ping(Arc::clone(&early_ping)).unwrap();

    // 再次请求提前引用得到同一个对象
    let again = creator
        .get_early_bean_reference(Arc::clone(&raw_ping), "ping", &mut session)
        .unwrap();
    assert!(Arc::ptr_eq(&again, &early_ping));

    // 3. pong 完成初始化
    let pong = creator
        .post_process_after_initialization(Arc::clone(&raw_pong), "pong", &mut session)
        .unwrap();
    let pong = session.exposed_object("pong", &raw_pong, pong);
    assert!(utils::is_aop_proxy(pong.as_ref()));
    raw_ping.set_pong(Arc::clone(&pong)).unwrap();

    // 4. ping 完成初始化，不能再被代理一次
    let processed = creator
        .post_process_after_initialization(Arc::clone(&raw_ping), "ping", &mut session)
        .unwrap();
    assert!(Arc::ptr_eq(&processed, &raw_ping));
    let ping = session.exposed_object("ping", &raw_ping, processed);
    assert!(Arc::ptr_eq(&ping, &early_ping));

    // 每一跳都经过代理
    assert_eq!(ping.ping(3).unwrap(), 3);
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[test]
fn test_bean_without_cycle_is_proxied_after_initialization() {
    let counter = Arc::new(AtomicUsize::new(0));
    let creator = creator(counter.clone());
    let mut session = CreationSession::new();

    let raw: ObjectRef = Arc::new(PingService::default());
    let processed = creator
        .post_process_after_initialization(Arc::clone(&raw), "ping", &mut session)
        .unwrap();
    let exposed = session.exposed_object("ping", &raw, processed);

    assert!(!Arc::ptr_eq(&exposed, &raw));
    assert!(session.is_empty());
    assert_eq!(exposed.ping(5).unwrap(), 0);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
