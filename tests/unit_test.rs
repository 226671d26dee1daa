// mmap_spsc/tests/unit_test.rs

use mmap_spsc::{channel, Error, Full, RegionKind};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[test]
fn test_new_queue_is_empty() {
   let (tx, rx) = channel::<i32>(5).unwrap();
   assert!(rx.is_empty());
   assert!(!rx.read_available());
   assert!(tx.write_available());
   assert_eq!(tx.size_guess(), 0);
   assert_eq!(tx.capacity(), 5);
   assert_eq!(rx.kind(), RegionKind::Heap);
}

#[test]
fn test_zero_capacity_rejected() {
   assert!(matches!(channel::<i32>(0), Err(Error::ZeroCapacity)));
}

#[test]
fn test_capacity_bound() {
   let (mut tx, mut rx) = channel::<i32>(4).unwrap();

   for i in 0..4 {
      tx.push(i).unwrap();
   }
   assert!(!tx.write_available(), "queue of 4 should be full after 4 items");
   assert_eq!(tx.push(99), Err(Full(99)));
   assert_eq!(rx.size_guess(), 4);

   // One read frees exactly one slot.
   assert_eq!(rx.pop(), Some(0));
   assert!(tx.write_available());
   tx.push(4).unwrap();
   assert_eq!(tx.push(5).unwrap_err().into_inner(), 5);

   let rest: Vec<_> = rx.drain().collect();
   assert_eq!(rest, vec![1, 2, 3, 4]);
   assert!(rx.is_empty());
   assert!(tx.write_available());
}

#[test]
fn test_capacity_one() {
   let (mut tx, mut rx) = channel::<u8>(1).unwrap();
   tx.push(7).unwrap();
   assert!(tx.push(8).is_err());
   assert_eq!(rx.pop(), Some(7));
   assert_eq!(rx.pop(), None);
   tx.push(8).unwrap();
   assert_eq!(rx.pop(), Some(8));
}

#[test]
fn test_sequential_fifo_with_wraparound() {
   let (mut tx, mut rx) = channel::<usize>(3).unwrap();
   let mut expected = 0;

   // Push/pop in uneven bursts so the cursors wrap several times.
   for round in 0..50usize {
      let burst = round % 3 + 1;
      for k in 0..burst {
         tx.push(round * 10 + k).unwrap();
      }
      assert_eq!(rx.size_guess(), burst);
      for k in 0..burst {
         assert_eq!(rx.pop(), Some(round * 10 + k));
         expected += 1;
      }
      assert!(rx.is_empty());
   }
   assert_eq!(expected, (0..50).map(|r| r % 3 + 1).sum::<usize>());
}

#[test]
fn test_random_sequential_write_then_read() {
   const N: usize = 1024;
   let mut rng = fastrand::Rng::with_seed(0x5eed);
   let data: Vec<i32> = (0..N).map(|_| rng.i32(0..N as i32)).collect();

   let (mut tx, mut rx) = channel::<i32>(N).unwrap();
   for v in &data {
      tx.push(*v).unwrap();
   }
   assert_eq!(rx.size_guess(), N);
   assert!(!rx.is_empty());

   let mut idx = 0;
   while let Some(v) = rx.pop() {
      assert_eq!(v, data[idx]);
      idx += 1;
   }
   assert_eq!(idx, N);
}

#[test]
fn test_owned_elements_move_through() {
   let (mut tx, mut rx) = channel::<String>(2).unwrap();
   tx.push("alpha".to_owned()).unwrap();
   tx.push("beta".to_owned()).unwrap();
   let rejected = tx.push("gamma".to_owned()).unwrap_err();
   assert_eq!(rejected.0, "gamma");
   assert_eq!(rx.pop().as_deref(), Some("alpha"));
   assert_eq!(rx.pop().as_deref(), Some("beta"));
}

/*──────────────────────────  destructor discipline  ───────────────────────*/

#[test]
fn test_drop_runs_remaining_destructors() {
   let tracker = Arc::new(());
   let (mut tx, mut rx) = channel::<Arc<()>>(5).unwrap();

   for _ in 0..5 {
      tx.push(tracker.clone()).unwrap();
   }
   for _ in 0..3 {
      drop(rx.pop().unwrap());
   }
   // 1 local + 2 resident in the queue.
   assert_eq!(Arc::strong_count(&tracker), 3);

   drop(tx);
   assert_eq!(Arc::strong_count(&tracker), 3, "ring lives while consumer does");
   drop(rx);
   assert_eq!(Arc::strong_count(&tracker), 1);
}

#[test]
fn test_drop_counts_exactly() {
   struct Counted(Arc<AtomicUsize>);
   impl Drop for Counted {
      fn drop(&mut self) {
         self.0.fetch_add(1, Ordering::SeqCst);
      }
   }

   let drops = Arc::new(AtomicUsize::new(0));
   {
      let (mut tx, mut rx) = channel::<Counted>(3).unwrap();
      // Wrap once so the live range straddles the end of the array.
      for _ in 0..3 {
         tx.push(Counted(drops.clone())).unwrap_or_else(|_| panic!("full"));
      }
      for _ in 0..2 {
         drop(rx.pop());
      }
      for _ in 0..2 {
         tx.push(Counted(drops.clone())).unwrap_or_else(|_| panic!("full"));
      }
      assert_eq!(drops.load(Ordering::SeqCst), 2);
      assert_eq!(rx.size_guess(), 3);
   }
   assert_eq!(drops.load(Ordering::SeqCst), 5);
}

#[test]
fn test_empty_queue_drop_is_noop() {
   let tracker = Arc::new(());
   let (mut tx, mut rx) = channel::<Arc<()>>(2).unwrap();
   tx.push(tracker.clone()).unwrap();
   drop(rx.pop());
   drop((tx, rx));
   assert_eq!(Arc::strong_count(&tracker), 1);
}

/*───────────────────────────────  threaded  ───────────────────────────────*/

#[test]
fn test_spsc_threads_checksum() {
   const N: u64 = 100_000;
   let (mut tx, mut rx) = channel::<u64>(64).unwrap();

   let producer = thread::spawn(move || {
      let mut sum = 0u64;
      for i in 0..N {
         let mut item = i * 7 + 3;
         sum += item;
         while let Err(Full(back)) = tx.push(item) {
            item = back;
            thread::yield_now();
         }
      }
      sum
   });

   let consumer = thread::spawn(move || {
      let mut sum = 0u64;
      let mut seen = 0u64;
      while seen < N {
         match rx.pop() {
            Some(v) => {
               sum += v;
               seen += 1;
            }
            None => thread::yield_now(),
         }
      }
      assert!(rx.pop().is_none(), "no element may be delivered twice");
      sum
   });

   let sent = producer.join().unwrap();
   let received = consumer.join().unwrap();
   assert_eq!(sent, received);
}

#[test]
fn test_spsc_threads_random_round_trip() {
   const N: usize = 100_000;
   let mut rng = fastrand::Rng::with_seed(42);
   let data: Arc<Vec<i32>> = Arc::new((0..N).map(|_| rng.i32(..)).collect());
   let (mut tx, mut rx) = channel::<i32>(128).unwrap();

   let sent = data.clone();
   let producer = thread::spawn(move || {
      for &v in sent.iter() {
         while tx.push(v).is_err() {
            std::hint::spin_loop();
         }
      }
   });

   let consumer = thread::spawn(move || {
      let mut out = Vec::with_capacity(N);
      while out.len() < N {
         match rx.pop() {
            Some(v) => out.push(v),
            None => std::hint::spin_loop(),
         }
      }
      out
   });

   producer.join().unwrap();
   let received = consumer.join().unwrap();
   assert_eq!(received.as_slice(), data.as_slice());
}

#[test]
fn test_observers_from_other_side() {
   let (mut tx, rx) = channel::<u32>(8).unwrap();
   let observer = thread::spawn(move || {
      // Estimates only; they must stay within bounds while the producer runs.
      for _ in 0..10_000 {
         let n = rx.size_guess();
         assert!(n <= rx.capacity());
      }
      rx
   });
   for i in 0..8 {
      tx.push(i).unwrap();
   }
   let rx = observer.join().unwrap();
   assert_eq!(rx.size_guess(), 8);
   assert!(!tx.write_available());
}

#[test]
fn test_size_guess_bounds_under_load() {
   const N: usize = 50_000;
   let (mut tx, mut rx) = channel::<usize>(16).unwrap();

   let producer = thread::spawn(move || {
      for i in 0..N {
         let mut item = i;
         while let Err(Full(back)) = tx.push(item) {
            item = back;
            thread::yield_now();
         }
         assert!(tx.size_guess() <= tx.capacity());
      }
   });

   // Whatever the consumer is told is queued must really be there.
   let mut next = 0;
   while next < N {
      let guess = rx.size_guess();
      assert!(guess <= rx.capacity());
      for _ in 0..guess {
         assert_eq!(rx.pop(), Some(next));
         next += 1;
      }
      if guess == 0 {
         thread::yield_now();
      }
   }
   producer.join().unwrap();
   assert_eq!(rx.size_guess(), 0);
}
