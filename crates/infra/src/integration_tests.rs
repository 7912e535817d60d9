//! End-to-end flows through the composition root.
//!
//! Sale → ledger → dispatch order → event store → bus → projection, plus the
//! failure paths: guarded transitions, payment gate, stale writes.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::Value as JsonValue;

    use backoffice_affiliates::{AffiliateTier, ContactInfo, NewAffiliate};
    use backoffice_core::{AggregateId, ExpectedVersion, TenantId};
    use backoffice_events::{EventEnvelope, InMemoryEventBus};
    use backoffice_fulfillment::{
        DispatchOrder, DispatchOrderEvent, DispatchOrderId, OrderOrigin, OrderShipped, PaymentConfirmation,
        PaymentConfirmed, PaymentGate, PaymentStatus, PricingSnapshot, ShipmentStatus, ShippingAddress,
    };
    use backoffice_logistics::{FixedClock, MockLogisticsProvider};
    use backoffice_products::{NewProduct, ProductId};
    use backoffice_sales::{SaleChannel, SaleInput};

    use crate::app::Backoffice;
    use crate::command_dispatcher::{CommandDispatcher, DispatchError};
    use crate::config::BackofficeConfig;
    use crate::error::ServiceError;
    use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
    use crate::projections::DispatchOrderDocument;
    use crate::read_model::InMemoryTenantStore;
    use crate::services::{FulfillmentService, NewDispatchOrder, RecordSale};

    const CLOCK_MILLIS: i64 = 1_767_225_604_821;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, hour, 0, 0).unwrap()
    }

    fn app_with(config: BackofficeConfig) -> Backoffice {
        let clock = FixedClock(Utc.timestamp_millis_opt(CLOCK_MILLIS).unwrap());
        Backoffice::with_logistics(config, Arc::new(MockLogisticsProvider::with_clock(Arc::new(clock)))).unwrap()
    }

    fn app() -> Backoffice {
        app_with(BackofficeConfig::default())
    }

    fn lima() -> ShippingAddress {
        ShippingAddress {
            recipient: Some("Rosa Huamán".to_string()),
            phone: Some("+51 988 111 222".to_string()),
            address_line: Some("Jr. Cusco 455".to_string()),
            district: Some("San Isidro".to_string()),
            city: Some("Lima".to_string()),
            reference: Some("frente al parque".to_string()),
        }
    }

    fn stripe(id: &str) -> PaymentConfirmation {
        PaymentConfirmation {
            provider: "stripe".to_string(),
            payment_id: id.to_string(),
        }
    }

    fn checkout_order(payment: Option<PaymentConfirmation>, shipping: ShippingAddress) -> NewDispatchOrder {
        NewDispatchOrder {
            origin: OrderOrigin {
                conversation_id: Some("wa-conv-77".to_string()),
                sale_id: None,
            },
            shipping,
            product_id: ProductId::new(),
            product_name: "Mochila".to_string(),
            quantity: 1,
            pricing: PricingSnapshot {
                unit_price: 120.0,
                total: 120.0,
                cost: 70.0,
                net_profit: 44.0,
            },
            payment,
        }
    }

    #[tokio::test]
    async fn affiliate_sale_flows_through_to_delivery() {
        let app = app();
        let t = TenantId::new();
        let events = app.subscribe();

        let product = app
            .catalog()
            .create_product(
                t,
                NewProduct {
                    sku: "MOCH-01".to_string(),
                    name: "Mochila urbana".to_string(),
                    retail_price: 500.0,
                    b2b_price: 420.0,
                    unit_cost: 300.0,
                    stock: 8,
                    min_stock: 2,
                },
            )
            .unwrap();
        let affiliate = app
            .affiliates()
            .register(
                t,
                NewAffiliate {
                    name: "Valeria".to_string(),
                    contact: ContactInfo::default(),
                    referral_code: "vale20".to_string(),
                    commission_percent: 20.0,
                    tier: AffiliateTier::Platinum,
                },
            )
            .unwrap();

        let sale = app
            .sales()
            .record_sale(
                t,
                RecordSale::completed(
                    SaleInput {
                        product_id: product.id,
                        channel: SaleChannel::Affiliate,
                        quantity: 1,
                        affiliate_id: Some(affiliate.id_typed()),
                        discount: 0.0,
                    },
                    at(9),
                ),
            )
            .unwrap();
        assert_eq!(sale.number().as_str(), "V-20260615-0001");
        assert_eq!(sale.breakdown().profit, 75.0);

        // Recording does not touch stock or the affiliate ledger.
        assert_eq!(app.catalog().get_product(t, product.id).unwrap().stock, 8);
        let credited = app.credit_affiliate_for_sale(t, sale.id_typed()).unwrap().unwrap();
        assert_eq!(credited.pending_balance(), 100.0);

        let order = app.dispatch_sale(t, sale.id_typed(), lima(), at(10)).unwrap();
        assert_eq!(order.origin.sale_id, Some(sale.id_typed()));
        assert_eq!(order.product_name, "Mochila urbana");
        assert_eq!(order.pricing.net_profit, 75.0);
        assert_eq!(order.shipment_status, ShipmentStatus::Pending);

        let (shipped, shipment) = app.fulfillment().ship_with_carrier(t, order.id, at(11)).await.unwrap();
        assert_eq!(shipment.tracking_number, "MOCK-LIMA-4821");
        assert_eq!(shipment.cost, 10.0);
        assert_eq!(shipped.tracking_number.as_deref(), Some("MOCK-LIMA-4821"));
        assert_eq!(shipped.courier.as_deref(), Some("Mock Express Lima"));
        assert_eq!(shipped.despachado_at, Some(at(11)));

        let delivered = app.fulfillment().mark_delivered(t, order.id, at(15)).unwrap();
        assert_eq!(delivered.shipment_status, ShipmentStatus::Delivered);
        assert_eq!(delivered.entregado_at, Some(at(15)));
        assert_eq!(delivered.version, 3);

        let published: Vec<String> = events
            .drain_for_tenant(t)
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(
            published,
            vec![
                "fulfillment.order.created",
                "fulfillment.order.shipped",
                "fulfillment.order.delivered"
            ]
        );
    }

    #[test]
    fn second_ship_is_rejected_and_tracking_kept() {
        let app = app();
        let t = TenantId::new();
        let order = app.fulfillment().create_order(t, checkout_order(None, lima()), at(8)).unwrap();

        app.fulfillment()
            .mark_shipped(t, order.id, Some("OLVA-1".to_string()), Some("Olva".to_string()), at(9))
            .unwrap();
        let err = app
            .fulfillment()
            .mark_shipped(t, order.id, Some("OLVA-2".to_string()), None, at(10))
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Dispatch(DispatchError::InvalidTransition { ref from, .. }) if from == "enviado"
        ));
        let doc = app.fulfillment().get_order(t, order.id).unwrap();
        assert_eq!(doc.tracking_number.as_deref(), Some("OLVA-1"));
        assert_eq!(doc.despachado_at, Some(at(9)));
    }

    #[tokio::test]
    async fn carrier_is_not_called_for_an_order_that_cannot_ship() {
        let app = app();
        let t = TenantId::new();
        let order = app.fulfillment().create_order(t, checkout_order(None, lima()), at(8)).unwrap();
        app.fulfillment().mark_shipped(t, order.id, None, None, at(9)).unwrap();

        let err = app.fulfillment().ship_with_carrier(t, order.id, at(10)).await.unwrap_err();

        assert!(matches!(err, ServiceError::Dispatch(DispatchError::InvalidTransition { .. })));
        assert!(app.fulfillment().get_order(t, order.id).unwrap().tracking_number.is_none());
    }

    #[tokio::test]
    async fn order_without_destination_cannot_book_a_carrier() {
        let app = app();
        let t = TenantId::new();
        let order = app
            .fulfillment()
            .create_order(t, checkout_order(None, ShippingAddress::default()), at(8))
            .unwrap();

        let err = app.fulfillment().ship_with_carrier(t, order.id, at(9)).await.unwrap_err();

        assert!(matches!(err, ServiceError::Logistics(_)));
        assert_eq!(
            app.fulfillment().get_order(t, order.id).unwrap().shipment_status,
            ShipmentStatus::Pending
        );
    }

    #[test]
    fn payment_webhook_is_idempotent() {
        let app = app();
        let t = TenantId::new();
        let order = app.fulfillment().create_order(t, checkout_order(None, lima()), at(8)).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Pending);

        let paid = app.fulfillment().confirm_payment(t, order.id, stripe("pi_A"), at(9)).unwrap();
        let again = app.fulfillment().confirm_payment(t, order.id, stripe("pi_A"), at(10)).unwrap();
        assert_eq!(paid, again);
        assert_eq!(again.payment_status, PaymentStatus::Paid);
        assert_eq!(again.payment_id.as_deref(), Some("pi_A"));

        let err = app
            .fulfillment()
            .confirm_payment(t, order.id, stripe("pi_B"), at(11))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn payment_gate_from_config_blocks_unpaid_shipping() {
        let mut config = BackofficeConfig::default();
        config.fulfillment.require_payment_before_shipping = true;
        let app = app_with(config);
        let t = TenantId::new();
        assert_eq!(app.fulfillment().payment_gate(), PaymentGate::RequirePaid);

        let unpaid = app.fulfillment().create_order(t, checkout_order(None, lima()), at(8)).unwrap();
        let err = app.fulfillment().mark_shipped(t, unpaid.id, None, None, at(9)).unwrap_err();
        assert!(matches!(err, ServiceError::Dispatch(DispatchError::InvariantViolation(_))));

        let paid = app
            .fulfillment()
            .create_order(t, checkout_order(Some(stripe("pi_C")), lima()), at(8))
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert!(app.fulfillment().mark_shipped(t, paid.id, None, None, at(9)).is_ok());
    }

    #[test]
    fn override_reaches_returned_and_listing_filters_by_status() {
        let app = app();
        let t = TenantId::new();
        let a = app.fulfillment().create_order(t, checkout_order(None, lima()), at(8)).unwrap();
        let b = app.fulfillment().create_order(t, checkout_order(None, lima()), at(9)).unwrap();

        app.fulfillment()
            .override_status(t, a.id, ShipmentStatus::Preparing, None, at(10))
            .unwrap();
        app.fulfillment()
            .override_status(t, b.id, ShipmentStatus::Returned, Some("dirección errada".to_string()), at(10))
            .unwrap();

        let returned = app.fulfillment().list_by_status(t, ShipmentStatus::Returned).unwrap();
        assert_eq!(returned.len(), 1);
        assert_eq!(returned[0].id, b.id);

        // `preparando` cannot be shipped through the guarded command.
        assert!(app.fulfillment().mark_shipped(t, a.id, None, None, at(11)).is_err());
        let all = app.fulfillment().list_orders(t).unwrap();
        assert_eq!(all.iter().map(|d| d.id).collect::<Vec<_>>(), vec![b.id, a.id]);
    }

    #[test]
    fn orders_are_tenant_isolated() {
        let app = app();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        let order = app.fulfillment().create_order(t1, checkout_order(None, lima()), at(8)).unwrap();

        assert!(matches!(
            app.fulfillment().get_order(t2, order.id),
            Err(ServiceError::NotFound(_))
        ));
        let err = app.fulfillment().mark_shipped(t2, order.id, None, None, at(9)).unwrap_err();
        assert!(matches!(err, ServiceError::Dispatch(DispatchError::NotFound)));
        assert!(app.fulfillment().list_orders(t2).unwrap().is_empty());
    }

    #[test]
    fn unknown_product_is_not_recorded_by_default() {
        let app = app();
        let t = TenantId::new();
        let err = app
            .sales()
            .record_sale(
                t,
                RecordSale::completed(
                    SaleInput {
                        product_id: ProductId::new(),
                        channel: SaleChannel::Retail,
                        quantity: 1,
                        affiliate_id: None,
                        discount: 0.0,
                    },
                    at(9),
                ),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Sale(_)));
        assert!(app.sales().list_sales(t).unwrap().is_empty());
    }

    /// Event store that lets another writer slip in right after the next load.
    #[derive(Default)]
    struct RacingStore {
        inner: InMemoryEventStore,
        intruder: Mutex<Option<UncommittedEvent>>,
    }

    impl RacingStore {
        fn intrude(&self, tenant_id: TenantId, order_id: DispatchOrderId, event: &DispatchOrderEvent) {
            let event =
                UncommittedEvent::from_typed(tenant_id, order_id.0, DispatchOrder::AGGREGATE_TYPE, uuid::Uuid::now_v7(), event)
                    .unwrap();
            *self.intruder.lock().unwrap() = Some(event);
        }
    }

    impl EventStore for RacingStore {
        fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.append(events, expected_version)
        }

        fn load_stream(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
            let stream = self.inner.load_stream(tenant_id, aggregate_id)?;
            if let Some(ev) = self.intruder.lock().unwrap().take() {
                self.inner.append(vec![ev], ExpectedVersion::Any)?;
            }
            Ok(stream)
        }

        fn load_tenant(&self, tenant_id: TenantId, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_tenant(tenant_id, aggregate_type)
        }
    }

    type RacingService = FulfillmentService<Arc<RacingStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn racing_service(store: Arc<RacingStore>) -> RacingService {
        let clock = FixedClock(Utc.timestamp_millis_opt(CLOCK_MILLIS).unwrap());
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let orders: Arc<InMemoryTenantStore<DispatchOrderId, DispatchOrderDocument>> =
            Arc::new(InMemoryTenantStore::new());
        FulfillmentService::new(
            CommandDispatcher::new(store, bus),
            orders,
            Arc::new(MockLogisticsProvider::with_clock(Arc::new(clock))),
            PaymentGate::Ignore,
        )
    }

    #[test]
    fn stale_write_surfaces_as_conflict_and_projection_follows_the_winner() {
        let store = Arc::new(RacingStore::default());
        let service = racing_service(store.clone());
        let t = TenantId::new();
        let order = service.create_order(t, checkout_order(None, lima()), at(8)).unwrap();
        store.intrude(
            t,
            order.id,
            &DispatchOrderEvent::PaymentConfirmed(PaymentConfirmed {
                tenant_id: t,
                order_id: order.id,
                payment: stripe("pi_race"),
                occurred_at: at(9),
            }),
        );

        let err = service
            .mark_shipped(t, order.id, Some("T-RACE".to_string()), None, at(9))
            .unwrap_err();

        assert!(err.is_conflict());
        assert!(matches!(err, ServiceError::Dispatch(DispatchError::Concurrency(_))));
        let stream = store.inner.load_stream(t, order.id.0).unwrap();
        assert_eq!(stream.len(), 2);
        assert!(stream.iter().all(|e| e.event_type != "fulfillment.order.shipped"));
        let doc = service.get_order(t, order.id).unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.payment_status, PaymentStatus::Paid);
        assert_eq!(doc.shipment_status, ShipmentStatus::Pending);
        assert!(doc.tracking_number.is_none());

        let retried = service
            .mark_shipped(t, order.id, Some("T-RACE".to_string()), None, at(10))
            .unwrap();
        assert_eq!(retried.version, 3);
        assert_eq!(retried.shipment_status, ShipmentStatus::Shipped);
        assert_eq!(retried.payment_id.as_deref(), Some("pi_race"));
    }

    #[tokio::test]
    async fn losing_a_ship_race_after_booking_reports_the_error() {
        let store = Arc::new(RacingStore::default());
        let service = racing_service(store.clone());
        let t = TenantId::new();
        let order = service.create_order(t, checkout_order(None, lima()), at(8)).unwrap();
        store.intrude(
            t,
            order.id,
            &DispatchOrderEvent::OrderShipped(OrderShipped {
                tenant_id: t,
                order_id: order.id,
                tracking_number: Some("OLVA-7".to_string()),
                courier_name: Some("Olva".to_string()),
                occurred_at: at(9),
            }),
        );

        let err = service.ship_with_carrier(t, order.id, at(9)).await.unwrap_err();

        assert!(matches!(err, ServiceError::Dispatch(DispatchError::InvalidTransition { .. })));
        let doc = service.get_order(t, order.id).unwrap();
        assert_eq!(doc.shipment_status, ShipmentStatus::Shipped);
        assert_eq!(doc.tracking_number.as_deref(), Some("OLVA-7"));
        assert_eq!(doc.version, 2);
    }

    #[test]
    fn concurrent_commands_keep_the_projection_in_step() {
        let app = app();
        let t = TenantId::new();
        let orders: Vec<_> = (0..64)
            .map(|_| app.fulfillment().create_order(t, checkout_order(None, lima()), at(8)).unwrap())
            .collect();

        std::thread::scope(|scope| {
            for (i, order) in orders.iter().enumerate() {
                let app = &app;
                scope.spawn(move || {
                    app.fulfillment()
                        .confirm_payment(t, order.id, stripe(&format!("pi_{i}")), at(9))
                        .unwrap();
                });
                scope.spawn(move || {
                    app.fulfillment().mark_shipped(t, order.id, None, None, at(9)).unwrap();
                });
            }
        });

        for order in &orders {
            let doc = app.fulfillment().get_order(t, order.id).unwrap();
            assert_eq!(doc.version, 3);
            assert_eq!(doc.payment_status, PaymentStatus::Paid);
            assert_eq!(doc.shipment_status, ShipmentStatus::Shipped);
        }
    }

    #[test]
    fn projection_rebuilds_from_the_event_store() {
        let app = app();
        let (t, other) = (TenantId::new(), TenantId::new());
        let order = app.fulfillment().create_order(t, checkout_order(None, lima()), at(8)).unwrap();
        app.fulfillment().confirm_payment(t, order.id, stripe("pi_R"), at(9)).unwrap();
        app.fulfillment()
            .mark_shipped(t, order.id, Some("T-9".to_string()), None, at(10))
            .unwrap();
        let second = app.fulfillment().create_order(t, checkout_order(None, lima()), at(11)).unwrap();
        let foreign = app.fulfillment().create_order(other, checkout_order(None, lima()), at(8)).unwrap();
        let before = app.fulfillment().list_orders(t).unwrap();

        app.rebuild_dispatch_projection(t).unwrap();

        assert_eq!(app.fulfillment().list_orders(t).unwrap(), before);
        assert_eq!(app.fulfillment().get_order(t, second.id).unwrap().version, 1);
        assert_eq!(app.fulfillment().get_order(other, foreign.id).unwrap(), foreign);

        // Cursors were reset with the documents, so commands keep projecting.
        let delivered = app.fulfillment().mark_delivered(t, order.id, at(12)).unwrap();
        assert_eq!(delivered.version, 4);
    }

    #[test]
    fn domain_validation_is_reported_not_swallowed() {
        let app = app();
        let t = TenantId::new();
        let mut order = checkout_order(None, lima());
        order.quantity = 0;

        let err = app.fulfillment().create_order(t, order, at(8)).unwrap_err();

        assert!(matches!(err, ServiceError::Dispatch(DispatchError::Validation(_))));
        assert!(app.fulfillment().list_orders(t).unwrap().is_empty());

        let err = app
            .affiliates()
            .register_payout(t, backoffice_affiliates::AffiliateId::new(), 5.0)
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
