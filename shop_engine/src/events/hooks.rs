use std::{future::Future, pin::Pin, sync::Arc};

use crate::{
    config::EngineConfig,
    events::{
        EventHandler,
        EventProducer,
        Handler,
        OrderCreatedEvent,
        OrderStatusChangedEvent,
        PaymentEventAbandonedEvent,
    },
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub order_status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub payment_event_abandoned_producer: Vec<EventProducer<PaymentEventAbandonedEvent>>,
}

impl EventProducers {
    pub async fn publish_order_created(&self, event: OrderCreatedEvent) {
        for producer in &self.order_created_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_status_changed(&self, event: OrderStatusChangedEvent) {
        for producer in &self.order_status_changed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payment_event_abandoned(&self, event: PaymentEventAbandonedEvent) {
        for producer in &self.payment_event_abandoned_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_payment_event_abandoned: Option<EventHandler<PaymentEventAbandonedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_created = hooks.on_order_created.map(|f| EventHandler::new(buffer_size, f));
        let on_order_status_changed = hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_event_abandoned = hooks.on_payment_event_abandoned.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_created, on_order_status_changed, on_payment_event_abandoned }
    }

    /// Creates the handlers with the channel capacity given by `SHOP_EVENT_BUFFER_SIZE`.
    pub fn from_config(config: &EngineConfig, hooks: EventHooks) -> Self {
        Self::new(config.event_buffer_size, hooks)
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_event_abandoned {
            result.payment_event_abandoned_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per registered hook. Each task ends once every producer for it has been dropped.
    pub fn start_handlers(self) -> Vec<tokio::task::JoinHandle<()>> {
        let mut tasks = Vec::new();
        if let Some(handler) = self.on_order_created {
            tasks.push(tokio::spawn(async move { handler.start_handler().await }));
        }
        if let Some(handler) = self.on_order_status_changed {
            tasks.push(tokio::spawn(async move { handler.start_handler().await }));
        }
        if let Some(handler) = self.on_payment_event_abandoned {
            tasks.push(tokio::spawn(async move { handler.start_handler().await }));
        }
        tasks
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_payment_event_abandoned: Option<Handler<PaymentEventAbandonedEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_payment_event_abandoned<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentEventAbandonedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_event_abandoned = Some(Arc::new(f));
        self
    }
}
