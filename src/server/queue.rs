//! # Cola de Conexiones
//! src/server/queue.rs
//!
//! Cola FIFO thread-safe y acotada entre el listener (productor) y los
//! workers (consumidores).
//!
//! Es un monitor clásico: un `Mutex` y dos `Condvar`. Todo predicado se vuelve
//! a evaluar bajo el lock después de despertar, así que `push`, `close` y
//! `pop_blocking` no pueden perder un aviso.

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Resultado de `pop_blocking`
#[derive(Debug, PartialEq, Eq)]
pub enum Pop<C> {
    /// La conexión más antigua de la cola
    Item(C),
    /// Cola vacía y cerrada: no habrá más trabajo
    Closed,
}

/// Error de encolado; devuelve la conexión para que el llamador la cierre
pub enum PushError<C> {
    Full(C),
    Closed(C),
}

impl<C> PushError<C> {
    pub fn into_inner(self) -> C {
        match self {
            PushError::Full(conn) | PushError::Closed(conn) => conn,
        }
    }
}

impl<C> fmt::Debug for PushError<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => f.write_str("Full(..)"),
            PushError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

struct State<C> {
    items: VecDeque<C>,
    closed: bool,
}

/// Cola FIFO acotada de conexiones pendientes
pub struct ConnectionQueue<C> {
    state: Arc<Mutex<State<C>>>,

    /// Avisa a los workers que hay conexiones (o que se cerró la cola)
    not_empty: Arc<Condvar>,

    /// Avisa al listener (y a `wait_until_empty`) que se liberó un lugar
    not_full: Arc<Condvar>,

    capacity: usize,
}

impl<C> ConnectionQueue<C> {
    /// Crea una cola vacía con capacidad máxima
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be >= 1");
        Self {
            state: Arc::new(Mutex::new(State {
                items: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            })),
            not_empty: Arc::new(Condvar::new()),
            not_full: Arc::new(Condvar::new()),
            capacity,
        }
    }

    // Nadie procesa conexiones con el lock tomado, así que el estado sigue
    // siendo consistente aunque otro thread haya hecho panic.
    fn lock(&self) -> MutexGuard<'_, State<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encola al final, bloqueando mientras la cola esté llena
    ///
    /// Retorna `Err(PushError::Closed)` si la cola se cerró antes de encontrar lugar.
    pub fn push(&self, conn: C) -> Result<(), PushError<C>> {
        let mut state = self.lock();

        while !state.closed && state.items.len() >= self.capacity {
            state = self.not_full.wait(state).unwrap_or_else(PoisonError::into_inner);
        }

        if state.closed {
            return Err(PushError::Closed(conn));
        }

        state.items.push_back(conn);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Encola sin bloquear
    pub fn try_push(&self, conn: C) -> Result<(), PushError<C>> {
        let mut state = self.lock();

        if state.closed {
            return Err(PushError::Closed(conn));
        }
        if state.items.len() >= self.capacity {
            return Err(PushError::Full(conn));
        }

        state.items.push_back(conn);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Desencola la conexión más antigua
    ///
    /// Bloquea mientras la cola esté vacía y abierta.
    pub fn pop_blocking(&self) -> Pop<C> {
        let mut state = self.lock();

        loop {
            if let Some(conn) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_all();
                return Pop::Item(conn);
            }

            if state.closed {
                return Pop::Closed;
            }

            state = self.not_empty.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Cierra la cola y despierta a todos los que esperan. Idempotente.
    ///
    /// Las conexiones ya encoladas se siguen entregando con `pop_blocking`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Cierra la cola y retira todo lo que quedaba en ella
    pub fn discard_remaining(&self) -> Vec<C> {
        let drained = {
            let mut state = self.lock();
            state.closed = true;
            state.items.drain(..).collect()
        };
        self.not_empty.notify_all();
        self.not_full.notify_all();
        drained
    }

    /// Espera a que la cola quede vacía o a que venza `deadline`
    ///
    /// Retorna `true` si la cola quedó vacía.
    pub fn wait_until_empty(&self, deadline: Instant) -> bool {
        let mut state = self.lock();

        while !state.items.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .not_full
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }

        true
    }

    /// Retorna el tamaño actual de la cola
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Obtiene estadísticas de la cola
    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            queued: state.items.len(),
            capacity: self.capacity,
            closed: state.closed,
        }
    }
}

impl<C> Clone for ConnectionQueue<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            not_empty: Arc::clone(&self.not_empty),
            not_full: Arc::clone(&self.not_full),
            capacity: self.capacity,
        }
    }
}

/// Estadísticas de la cola
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub capacity: usize,
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_ordering() {
        let queue = ConnectionQueue::new(16);
        for id in 0..5 {
            queue.push(id).unwrap();
        }

        for expected in 0..5 {
            assert_eq!(queue.pop_blocking(), Pop::Item(expected));
        }
    }

    #[test]
    fn test_try_push_full() {
        let queue = ConnectionQueue::new(2);
        assert!(queue.try_push(1).is_ok());
        assert!(queue.try_push(2).is_ok());

        match queue.try_push(3) {
            Err(PushError::Full(conn)) => assert_eq!(conn, 3),
            other => panic!("expected Full, got {:?}", other),
        }
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_push_after_close_returns_connection() {
        let queue = ConnectionQueue::new(2);
        queue.close();

        let err = queue.push(7).unwrap_err();
        assert!(matches!(err, PushError::Closed(_)));
        assert_eq!(err.into_inner(), 7);
    }

    #[test]
    fn test_close_drains_before_reporting_closed() {
        let queue = ConnectionQueue::new(4);
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        queue.close();

        assert_eq!(queue.pop_blocking(), Pop::Item(1));
        assert_eq!(queue.pop_blocking(), Pop::Item(2));
        assert_eq!(queue.pop_blocking(), Pop::Closed);
    }

    #[test]
    fn test_close_wakes_all_consumers() {
        let queue: ConnectionQueue<u32> = ConnectionQueue::new(4);
        let (tx, rx) = mpsc::channel();

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let tx = tx.clone();
                thread::spawn(move || {
                    tx.send(queue.pop_blocking()).unwrap();
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.close();

        for _ in 0..4 {
            let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(result, Pop::Closed);
        }
        for c in consumers {
            c.join().unwrap();
        }
    }

    #[test]
    fn test_push_blocks_while_full() {
        let queue = ConnectionQueue::new(1);
        queue.push(1).unwrap();

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.push(2).is_ok())
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.pop_blocking(), Pop::Item(1));
        assert!(producer.join().unwrap());
        assert_eq!(queue.pop_blocking(), Pop::Item(2));
    }

    #[test]
    fn test_blocked_push_released_by_close() {
        let queue = ConnectionQueue::new(1);
        queue.push(1).unwrap();

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.push(2).map_err(PushError::into_inner))
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();

        assert_eq!(producer.join().unwrap(), Err(2));
    }

    #[test]
    fn test_discard_remaining() {
        let queue = ConnectionQueue::new(8);
        for id in 0..3 {
            queue.push(id).unwrap();
        }

        assert_eq!(queue.discard_remaining(), vec![0, 1, 2]);
        assert!(queue.is_closed());
        assert_eq!(queue.pop_blocking(), Pop::Closed);
    }

    #[test]
    fn test_wait_until_empty() {
        let queue = ConnectionQueue::new(8);
        queue.push(1).unwrap();

        let deadline = Instant::now() + Duration::from_millis(30);
        assert!(!queue.wait_until_empty(deadline));

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                queue.pop_blocking()
            })
        };

        assert!(queue.wait_until_empty(Instant::now() + Duration::from_secs(5)));
        assert_eq!(consumer.join().unwrap(), Pop::Item(1));
    }

    #[test]
    fn test_concurrent_consumers_see_each_item_once() {
        let queue = ConnectionQueue::new(64);
        let (tx, rx) = mpsc::channel();

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let tx = tx.clone();
                thread::spawn(move || {
                    while let Pop::Item(id) = queue.pop_blocking() {
                        tx.send(id).unwrap();
                    }
                })
            })
            .collect();
        drop(tx);

        for id in 0..200 {
            queue.push(id).unwrap();
        }
        queue.close();

        for c in consumers {
            c.join().unwrap();
        }

        let mut seen: Vec<u32> = rx.iter().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn test_stats() {
        let queue = ConnectionQueue::new(3);
        queue.push(1).unwrap();
        assert_eq!(
            queue.stats(),
            QueueStats { queued: 1, capacity: 3, closed: false }
        );
    }
}
