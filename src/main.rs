use std::error::Error;
use std::sync::Arc;

use env_logger::Env;
use log::info;

use strata::buffer::BufferPoolManager;
use strata::catalog;
use strata::common::{PageId, RowId};
use strata::index::{BPlusTree, IntegerComparator};
use strata::storage::disk::DiskManager;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    println!("Strata - page storage and B+Tree index");
    println!("======================================\n");

    let db_path = "demo.db";
    std::fs::remove_file(db_path).ok();

    {
        let disk_manager = Arc::new(DiskManager::new(db_path)?);
        let bpm = Arc::new(BufferPoolManager::new(16, Arc::clone(&disk_manager)));
        catalog::bootstrap(&bpm)?;
        println!("Created {} with a 16-frame buffer pool", db_path);

        // Small nodes so the demo splits and merges.
        let mut tree = BPlusTree::new(0, Arc::clone(&bpm), IntegerComparator, 4, 4)?;
        for k in (0..64).rev() {
            let rid = RowId::new(PageId::new(100 + k as u32 / 8), k as u32 % 8);
            tree.insert(&IntegerComparator::encode(k), rid)?;
        }
        tree.check()?;
        println!("Inserted 64 keys, root is {}", tree.root_page_id());

        let start = IntegerComparator::encode(10);
        let scanned: Vec<i32> = tree
            .begin_at(&start)?
            .take(5)
            .map(|entry| entry.map(|(key, _)| IntegerComparator::decode(&key)))
            .collect::<Result<_, _>>()?;
        println!("Keys from 10: {:?}", scanned);

        for k in (0..64).filter(|k| k % 2 == 0) {
            tree.remove(&IntegerComparator::encode(k))?;
        }
        tree.check()?;
        let remaining = tree.begin()?.count();
        println!("Removed even keys, {} remain", remaining);

        bpm.flush_all_pages()?;
        info!(
            "{} reads, {} writes, {} pages allocated",
            disk_manager.get_num_reads(),
            disk_manager.get_num_writes(),
            disk_manager.num_allocated_pages()
        );
    }

    // Reopen and find the tree through the index roots page.
    {
        let disk_manager = Arc::new(DiskManager::new(db_path)?);
        let bpm = Arc::new(BufferPoolManager::new(16, disk_manager));
        catalog::bootstrap(&bpm)?;
        let tree = BPlusTree::new(0, Arc::clone(&bpm), IntegerComparator, 4, 4)?;
        let found = tree.get_value(&IntegerComparator::encode(33))?;
        println!("\nAfter reopening, key 33 maps to {:?}", found);
    }

    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
    Ok(())
}
