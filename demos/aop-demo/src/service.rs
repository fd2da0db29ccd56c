//! 业务服务
//!
//! `OrderServiceImpl` 和 `InventoryServiceImpl` 互相依赖，演示循环依赖下的自动代理。

use chimera_aop::anyhow::{self, bail, Context};
use chimera_aop::ObjectRef;
use chimera_aop_macros::{aop_class, aop_interface};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("item '{item}' is out of stock (available: {available}, requested: {requested})")]
pub struct OutOfStock {
    pub item: String,
    pub available: u32,
    pub requested: u32,
}

#[aop_interface(name = "com.example.shop.OrderService")]
pub trait OrderService: Send + Sync {
    fn place_order(&self, item: String, quantity: u32) -> anyhow::Result<u64>;

    fn order_count(&self) -> anyhow::Result<u64>;
}

#[aop_interface(name = "com.example.shop.InventoryService")]
pub trait InventoryService: Send + Sync {
    fn reserve(&self, item: String, quantity: u32) -> anyhow::Result<u32>;

    fn report(&self) -> anyhow::Result<String>;
}

/// 订单服务，依赖库存服务
#[derive(Default)]
pub struct OrderServiceImpl {
    inventory: OnceCell<ObjectRef>,
    next_id: AtomicU64,
}

#[aop_class(name = "com.example.shop.OrderServiceImpl", interfaces(OrderService))]
impl OrderServiceImpl {
    pub fn set_inventory(&self, inventory: ObjectRef) -> anyhow::Result<()> {
        self.inventory
            .set(inventory)
            .map_err(|_| anyhow::anyhow!("inventory service already injected"))
    }

    pub fn inventory(&self) -> Option<&ObjectRef> {
        self.inventory.get()
    }
}

impl OrderService for OrderServiceImpl {
    fn place_order(&self, item: String, quantity: u32) -> anyhow::Result<u64> {
        if quantity == 0 {
            bail!("quantity must be positive");
        }
        let inventory = self.inventory.get().context("inventory service not injected")?;
        inventory.reserve(item, quantity)?;
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn order_count(&self) -> anyhow::Result<u64> {
        Ok(self.next_id.load(Ordering::SeqCst))
    }
}

/// 库存服务，反向依赖订单服务
pub struct InventoryServiceImpl {
    orders: OnceCell<ObjectRef>,
    stock: Mutex<HashMap<String, u32>>,
}

#[aop_class(name = "com.example.shop.InventoryServiceImpl", interfaces(InventoryService))]
impl InventoryServiceImpl {
    pub fn with_stock(stock: impl IntoIterator<Item = (&'static str, u32)>) -> Self {
        Self {
            orders: OnceCell::new(),
            stock: Mutex::new(
                stock
                    .into_iter()
                    .map(|(item, count)| (item.to_string(), count))
                    .collect(),
            ),
        }
    }

    pub fn set_orders(&self, orders: ObjectRef) -> anyhow::Result<()> {
        self.orders
            .set(orders)
            .map_err(|_| anyhow::anyhow!("order service already injected"))
    }

    pub fn orders(&self) -> Option<&ObjectRef> {
        self.orders.get()
    }
}

impl InventoryService for InventoryServiceImpl {
    fn reserve(&self, item: String, quantity: u32) -> anyhow::Result<u32> {
        let mut stock = self.stock.lock();
        let available = stock.get(&item).copied().unwrap_or(0);
        if available < quantity {
            return Err(OutOfStock {
                item,
                available,
                requested: quantity,
            }
            .into());
        }
        let left = available - quantity;
        stock.insert(item, left);
        Ok(left)
    }

    fn report(&self) -> anyhow::Result<String> {
        let orders = self.orders.get().context("order service not injected")?;
        let stock = self.stock.lock();
        let mut items: Vec<_> = stock.iter().collect();
        items.sort();
        Ok(format!("{} order(s) placed, stock: {:?}", orders.order_count()?, items))
    }
}
