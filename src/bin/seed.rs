use bcrypt::{hash, DEFAULT_COST};
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use rusqlite::Connection;
use std::error::Error;

use chirp::config::Config;
use chirp::error::AppError;
use chirp::models::User;
use chirp::{db, repo};

fn main() -> Result<(), Box<dyn Error>> {
    println!("Starting data seeding...");

    let config = Config::from_env();
    let conn = db::open(&config.database_path)?;
    db::init_schema(&conn)?;

    // Configuration
    let num_users = 25;
    let posts_per_user = 4;
    let follows_per_user = 5;

    seed_admin(&conn)?;
    let users = seed_users(&conn, num_users)?;
    seed_follows(&conn, &users, follows_per_user);
    seed_posts(&conn, &users, posts_per_user)?;

    println!("Seeding completed!");
    Ok(())
}

fn seed_admin(conn: &Connection) -> Result<(), Box<dyn Error>> {
    let password_hash = hash("password", DEFAULT_COST)?;
    match repo::create_user(conn, "admin", "admin@example.com", &password_hash, true) {
        Ok(user) => println!("Created admin user {} ({})", user.username, user.id),
        Err(AppError::Validation(_)) => println!("Admin user already present, skipping"),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn seed_users(conn: &Connection, count: usize) -> Result<Vec<User>, Box<dyn Error>> {
    println!("Creating {} users...", count);
    let mut users = Vec::new();

    for i in 0..count {
        let username: String = Username().fake();
        let email: String = SafeEmail().fake();
        let password_hash = hash("password123", DEFAULT_COST)?;

        match repo::create_user(conn, &username, &email, &password_hash, false) {
            Ok(user) => {
                println!(
                    "Created user {}/{}: {} ({})",
                    i + 1,
                    count,
                    user.username,
                    user.id
                );
                users.push(user);
            }
            // Generated names occasionally collide; just move on.
            Err(AppError::Validation(_)) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(users)
}

fn seed_follows(conn: &Connection, users: &[User], follows_per_user: usize) {
    println!("Creating up to {} follows per user...", follows_per_user);
    let mut total = 0;

    for (i, user) in users.iter().enumerate() {
        for offset in 1..=follows_per_user {
            let target = &users[(i + offset) % users.len()];
            if target.id == user.id {
                continue;
            }
            match repo::follow(conn, user.id, target.id) {
                Ok(true) => total += 1,
                Ok(false) => {}
                Err(err) => eprintln!("Failed to follow {}: {}", target.username, err),
            }
        }
    }

    println!("Created {} follow edges", total);
}

fn seed_posts(
    conn: &Connection,
    users: &[User],
    posts_per_user: usize,
) -> Result<(), Box<dyn Error>> {
    println!("Creating {} posts per user...", posts_per_user);
    let total_posts = users.len() * posts_per_user;
    let mut current_post = 0;

    for user in users {
        for _ in 0..posts_per_user {
            let content: String = Sentence(3..10).fake();
            repo::create_post(conn, user, &content)?;

            current_post += 1;
            if current_post % 20 == 0 {
                println!("Created {}/{} posts", current_post, total_posts);
            }
        }
    }

    Ok(())
}
