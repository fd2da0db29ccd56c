mod aspects;
mod container;
mod service;

use chimera_aop::prelude::*;
use container::{BeanDefinition, MiniContainer};
use service::{
    InventoryService, InventoryServiceImpl, InventoryServiceImplContract, OrderService,
    OrderServiceImpl, OrderServiceImplContract, OutOfStock,
};
use std::path::Path;

// ==================== 容器配置 ====================

fn build_container(config: &AopConfig) -> anyhow::Result<MiniContainer> {
    let registry = get_global_registry()?;
    tracing::info!("Advisors: {:?}", registry.names());

    let mut container = MiniContainer::new();
    container.add_post_processor(Arc::new(
        DefaultAdvisorAutoProxyCreator::new(Arc::clone(registry) as Arc<dyn AdvisorLookup>)
            .with_config(config),
    ));

    // orderService 和 inventoryService 互相依赖
    container.register(
        BeanDefinition::new("orderService", || Arc::new(OrderServiceImpl::default()) as ObjectRef)
            .depends_on("inventoryService", |bean, dependency| bean.set_inventory(dependency)),
    );
    container.register(
        BeanDefinition::new("inventoryService", || {
            Arc::new(InventoryServiceImpl::with_stock([("book", 5), ("pen", 20)])) as ObjectRef
        })
        .depends_on("orderService", |bean, dependency| bean.set_orders(dependency)),
    );

    container.refresh()?;
    Ok(container)
}

/// 代理背后的原始 Bean
fn raw_target(bean: &ObjectRef) -> anyhow::Result<ObjectRef> {
    match bean.advised() {
        Some(advised) => advised.target_source().get_target(),
        None => Ok(Arc::clone(bean)),
    }
}

fn main() -> anyhow::Result<()> {
    let config_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/application.toml");
    let config = if config_path.exists() {
        AopConfig::from_file(&config_path)?
    } else {
        AopConfig::default()
    };
    config.logging.clone().init()?;

    tracing::info!("🚀 Starting AOP demo (proxy_target_class = {})", config.proxy_target_class);

    let mut container = build_container(&config)?;
    let orders = container.get_bean("orderService")?;
    let inventory = container.get_bean("inventoryService")?;

    // ==================== 循环依赖 ====================

    println!("\n=== Circular references ===");
    println!("orderService is proxy: {}", utils::is_aop_proxy(orders.as_ref()));
    println!("inventoryService is proxy: {}", utils::is_aop_proxy(inventory.as_ref()));
    println!(
        "orderService target class: {}",
        utils::ultimate_target_class(orders.as_ref()).name()
    );

    // 依赖方持有的引用必须是容器中的同一个代理
    let raw_orders = raw_target(&orders)?;
    let raw_inventory = raw_target(&inventory)?;
    if let Some(order_service) = raw_orders.downcast_ref::<OrderServiceImpl>() {
        let same = order_service.inventory().is_some_and(|held| Arc::ptr_eq(held, &inventory));
        println!("orderService holds the container's inventoryService: {}", same);
    }
    if let Some(inventory_service) = raw_inventory.downcast_ref::<InventoryServiceImpl>() {
        let same = inventory_service.orders().is_some_and(|held| Arc::ptr_eq(held, &orders));
        println!("inventoryService holds the container's orderService: {}", same);
    }

    // ==================== 通知执行 ====================

    println!("\n=== Placing orders ===");
    let first = orders.place_order("book".to_string(), 2)?;
    let second = orders.place_order("pen".to_string(), 5)?;
    println!("orders placed: #{first}, #{second}");

    match orders.place_order("book".to_string(), 10) {
        Ok(id) => println!("unexpected order #{id}"),
        Err(e) => match e.downcast_ref::<OutOfStock>() {
            Some(out_of_stock) => println!("rejected: {}", out_of_stock),
            None => println!("rejected: {}", e),
        },
    }

    println!("\n=== Report ===");
    println!("{}", inventory.report()?);

    // ==================== Advised 视图 ====================

    println!("\n=== Proxy configuration ===");
    if let Some(advised) = orders.advised() {
        println!("proxy kind: {:?}", advised.proxy_kind());
        for advisor in advised.advisors() {
            println!("  advisor: {}", advisor.name());
        }
    }

    // 子类代理：类自身的方法也能被拦截
    let mut factory = ProxyFactory::with_target(Arc::new(OrderServiceImpl::default()));
    factory.set_proxy_target_class(true);
    factory.add_advice(Advice::around(TraceInterceptor))?;
    let subclass_proxy = factory.get_proxy()?;
    println!("\nsubclass proxy class: {}", subclass_proxy.class());
    if let Err(e) = subclass_proxy.place_order("book".to_string(), 1) {
        println!("standalone order fails as expected: {:#}", e);
    }

    Ok(())
}
