use vendmap_client::VendmapClient;

pub(crate) async fn run_login(
    mut client: VendmapClient,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let token = client.login(email, password).await?;
    let me = client.me().await?;
    eprintln!("logged in as {} <{}>", me.username, me.email);
    println!("export VENDMAP_TOKEN={token}");
    Ok(())
}

pub(crate) async fn run_register(
    mut client: VendmapClient,
    email: &str,
    password: &str,
    username: Option<&str>,
) -> anyhow::Result<()> {
    let token = client.register(email, password, username).await?;
    let me = client.me().await?;
    eprintln!("registered {} <{}>", me.username, me.email);
    println!("export VENDMAP_TOKEN={token}");
    Ok(())
}
