//! 单写多读事件总线
//!
//! 保存最新值（回放深度 1），并广播给所有订阅者。
//! 订阅时先收到当前最新值，然后是之后发布的值；不会收到更早的历史。

use futures::stream::BoxStream;
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// 默认广播缓冲区大小
const DEFAULT_CAPACITY: usize = 64;

pub struct EventBus<T> {
    latest: Mutex<Option<T>>,
    sender: broadcast::Sender<T>,
}

impl<T> EventBus<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            latest: Mutex::new(None),
            sender,
        }
    }

    /// 创建并发布初始值
    pub fn with_initial(value: T) -> Self {
        let bus = Self::new();
        bus.publish(value);
        bus
    }

    /// 发布新值
    pub fn publish(&self, value: T) {
        // 持锁发送，保证订阅时取到的最新值与之后的广播之间没有空隙
        let mut latest = self.latest.lock();
        *latest = Some(value.clone());
        let _ = self.sender.send(value);
    }

    /// 当前最新值
    pub fn latest(&self) -> Option<T> {
        self.latest.lock().clone()
    }

    /// 订阅：先回放最新值，再接收后续发布
    pub fn subscribe(&self) -> BoxStream<'static, T> {
        let (mut receiver, initial) = {
            let latest = self.latest.lock();
            (self.sender.subscribe(), latest.clone())
        };

        Box::pin(async_stream::stream! {
            if let Some(value) = initial {
                yield value;
            }
            loop {
                match receiver.recv().await {
                    Ok(value) => yield value,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("[事件总线] 订阅者落后，跳过 {} 个事件", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T> Default for EventBus<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
